//! Scalar helpers shared by the layers.

/// Scalar type used by every tensor and parameter in this crate.
pub type Float = f32;

/// Sign of `x`: `-1`, `0` or `+1`.
///
/// Unlike [`f32::signum`], zero maps to zero.
#[inline]
pub fn sign(x: Float) -> Float {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Derivative of hard-tanh (`clamp(x, -1, 1)`), used as the straight-through
/// surrogate gradient of [`sign`].
#[inline]
pub fn hard_tanh_grad(x: Float) -> Float {
    if x.abs() <= 1.0 { 1.0 } else { 0.0 }
}
