use std::time::{SystemTime, UNIX_EPOCH};

use object::Slot;
use rand::Rng;

use crate::{NativeContext, RuntimeError};

pub fn abs_integer(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    Ok(Some(Slot::Scalar(ctx.scalar(0)?.wrapping_abs())))
}

pub fn real_integer(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    Ok(Some(Slot::from_f64(ctx.scalar(0)? as f64)))
}

pub fn sqrt_real(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    Ok(Some(Slot::from_f64(ctx.float(0)?.sqrt())))
}

pub fn log_real(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    Ok(Some(Slot::from_f64(ctx.float(0)?.ln())))
}

// rounding natives produce integers, not float bits
pub fn ceil_real(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    Ok(Some(Slot::Scalar(ctx.float(0)?.ceil() as i64)))
}

pub fn floor_real(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    Ok(Some(Slot::Scalar(ctx.float(0)?.floor() as i64)))
}

/// Milliseconds since the Unix epoch.
pub fn now(_ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as i64);
    Ok(Some(Slot::Scalar(millis)))
}

/// Uniform in `[low, high]`. An empty range yields `low`.
pub fn random_integer(ctx: &mut NativeContext) -> Result<Option<Slot>, RuntimeError> {
    let low = ctx.scalar(0)?;
    let high = ctx.scalar(1)?;
    if high <= low {
        return Ok(Some(Slot::Scalar(low)));
    }
    Ok(Some(Slot::Scalar(rand::rng().random_range(low..=high))))
}
