/// Scalar sample types a volume can hold.
///
/// Conversions from `f64` clamp to the representable range and truncate
/// toward zero, the way interpolated or synthesized values are cast back
/// into integer pixels.
pub trait Sample: Copy + Default + PartialEq + Send + Sync + std::fmt::Debug + 'static {
    const MIN_VALUE: f64;
    const MAX_VALUE: f64;

    fn to_f64(self) -> f64;

    fn from_f64_clamped(value: f64) -> Self;

    /// Like [`Sample::from_f64_clamped`] but rounds to the nearest integer
    /// first for integer types. Used where values are averaged.
    fn from_f64_rounded(value: f64) -> Self {
        Self::from_f64_clamped(value)
    }
}

macro_rules! impl_integer_sample {
    ($($t:ty),*) => {
        $(
            impl Sample for $t {
                const MIN_VALUE: f64 = <$t>::MIN as f64;
                const MAX_VALUE: f64 = <$t>::MAX as f64;

                #[inline]
                fn to_f64(self) -> f64 {
                    self as f64
                }

                #[inline]
                fn from_f64_clamped(value: f64) -> Self {
                    if value.is_nan() {
                        return 0;
                    }
                    value.clamp(Self::MIN_VALUE, Self::MAX_VALUE).trunc() as $t
                }

                #[inline]
                fn from_f64_rounded(value: f64) -> Self {
                    Self::from_f64_clamped(value.round())
                }
            }
        )*
    };
}

impl_integer_sample!(i8, u8, i16, u16, i32, u32);

impl Sample for f32 {
    const MIN_VALUE: f64 = f32::MIN as f64;
    const MAX_VALUE: f64 = f32::MAX as f64;

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64_clamped(value: f64) -> Self {
        value.clamp(Self::MIN_VALUE, Self::MAX_VALUE) as f32
    }
}

impl Sample for f64 {
    const MIN_VALUE: f64 = f64::MIN;
    const MAX_VALUE: f64 = f64::MAX;

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline]
    fn from_f64_clamped(value: f64) -> Self {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_conversion_clamps_and_truncates() {
        assert_eq!(i16::from_f64_clamped(40_000.0), i16::MAX);
        assert_eq!(i16::from_f64_clamped(-40_000.0), i16::MIN);
        assert_eq!(i16::from_f64_clamped(12.9), 12);
        assert_eq!(i16::from_f64_clamped(-12.9), -12);
        assert_eq!(u8::from_f64_clamped(-3.0), 0);
        assert_eq!(u8::from_f64_clamped(f64::NAN), 0);
        assert_eq!(i16::from_f64_rounded(99.999_999), 100);
        assert_eq!(i16::from_f64_rounded(-2.5), -3);
    }

    #[test]
    fn float_conversion_keeps_fraction() {
        assert_eq!(f32::from_f64_clamped(1.25), 1.25);
        assert_eq!(f64::from_f64_clamped(-7.5), -7.5);
    }
}
