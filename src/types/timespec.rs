//! `struct timespec`

use bytemuck::{Pod, Zeroable};

use super::native::{init_fields, unknown_field, NativeStruct};
use crate::host::HostValue;
use crate::registry::{Handle, Method, ObjectRegistry};
use crate::status::{CoreError, CoreResult};

pub const NANOS_PER_SEC: i64 = 1_000_000_000;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct Timespec {
    pub tv_sec: i64,
    pub tv_nsec: i64,
}

impl Timespec {
    pub fn new(tv_sec: i64, tv_nsec: i64) -> Self {
        Self { tv_sec, tv_nsec }
    }

    /// Split fractional seconds into whole seconds and nanoseconds
    pub fn from_secs_f64(secs: f64) -> CoreResult<Self> {
        if !secs.is_finite() || secs.abs() >= i64::MAX as f64 {
            return Err(CoreError::range(format!("{} seconds out of range", secs)));
        }
        let whole = secs.floor();
        let mut ts = Self::new(whole as i64, ((secs - whole) * 1e9).round() as i64);
        ts.normalize()?;
        Ok(ts)
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.tv_sec as f64 + self.tv_nsec as f64 / 1e9
    }

    /// Carry nanoseconds into seconds so that `0 <= tv_nsec < 1e9`
    pub fn normalize(&mut self) -> CoreResult<()> {
        let carry = self.tv_nsec.div_euclid(NANOS_PER_SEC);
        self.tv_sec = self
            .tv_sec
            .checked_add(carry)
            .ok_or_else(|| CoreError::range("timespec seconds overflow"))?;
        self.tv_nsec = self.tv_nsec.rem_euclid(NANOS_PER_SEC);
        Ok(())
    }
}

impl NativeStruct for Timespec {
    const NAME: &'static str = "timespec";
    const FIELDS: &'static [&'static str] = &["tv_sec", "tv_nsec"];

    fn field(&self, name: &str) -> CoreResult<HostValue> {
        match name {
            "tv_sec" => Ok(self.tv_sec.into()),
            "tv_nsec" => Ok(self.tv_nsec.into()),
            _ => Err(unknown_field(Self::NAME, name)),
        }
    }

    fn set_field(&mut self, name: &str, value: &HostValue) -> CoreResult<()> {
        match name {
            "tv_sec" => self.tv_sec = value.to_int(name)?,
            "tv_nsec" => self.tv_nsec = value.to_int(name)?,
            _ => return Err(unknown_field(Self::NAME, name)),
        }
        Ok(())
    }

    /// Accepts a number of seconds as well as a field table
    fn init(&mut self, init: &HostValue) -> CoreResult<()> {
        match init {
            HostValue::Integer(secs) => {
                self.tv_sec = *secs;
                Ok(())
            }
            HostValue::Number(secs) => {
                *self = Timespec::from_secs_f64(*secs)?;
                Ok(())
            }
            _ => init_fields(self, init),
        }
    }

    fn methods() -> &'static [Method] {
        TIMESPEC_METHODS
    }
}

static TIMESPEC_METHODS: &[Method] = &[
    Method::new("seconds", seconds),
    Method::new("normalize", normalize),
];

fn seconds(reg: &mut ObjectRegistry, h: Handle, _args: &[HostValue]) -> CoreResult<HostValue> {
    let ts: Timespec = reg.payload(h)?.read()?;
    Ok(ts.as_secs_f64().into())
}

fn normalize(reg: &mut ObjectRegistry, h: Handle, _args: &[HostValue]) -> CoreResult<HostValue> {
    reg.payload_mut(h)?.update::<Timespec, _>(|ts| ts.normalize())?;
    Ok(h.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_fractional_seconds() {
        let ts = Timespec::from_secs_f64(1.25).unwrap();
        assert_eq!(ts, Timespec::new(1, 250_000_000));

        let neg = Timespec::from_secs_f64(-0.5).unwrap();
        assert_eq!(neg, Timespec::new(-1, 500_000_000));

        assert!(Timespec::from_secs_f64(f64::NAN).is_err());
    }

    #[test]
    fn test_normalize() {
        let mut ts = Timespec::new(2, 3 * NANOS_PER_SEC + 7);
        ts.normalize().unwrap();
        assert_eq!(ts, Timespec::new(5, 7));

        let mut under = Timespec::new(0, -1);
        under.normalize().unwrap();
        assert_eq!(under, Timespec::new(-1, NANOS_PER_SEC - 1));

        let mut overflow = Timespec::new(i64::MAX, NANOS_PER_SEC);
        assert!(matches!(overflow.normalize(), Err(CoreError::RangeError(_))));
    }

    #[test]
    fn test_init_variants() {
        let mut ts = Timespec::zeroed();
        ts.init(&HostValue::Integer(30)).unwrap();
        assert_eq!(ts, Timespec::new(30, 0));

        let mut ts = Timespec::zeroed();
        ts.init(&HostValue::Number(0.001)).unwrap();
        assert_eq!(ts, Timespec::new(0, 1_000_000));
    }
}
