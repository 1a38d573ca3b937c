//! Compile-time-bounded key sets.
//!
//! `Recorder<K>` needs a closed, contiguous `[0, COUNT)` index space per
//! key enum to size its table once at construction; `RecorderKey` is that
//! contract, usually implemented via the derive-like [`recorder_key!`]
//! helper macro below rather than written out by hand.

/// A closed, compile-time-bounded set of recorder keys.
///
/// Implementors must guarantee `index()` returns a value in `[0, COUNT)`
/// and that `COUNT` matches the number of distinct keys — the recorder's
/// table is allocated with exactly `COUNT` slots and never resizes.
pub trait RecorderKey: Copy + Clone + 'static {
    /// Number of distinct keys; also the fixed table size for a `Recorder<Self>`.
    const COUNT: usize;

    /// Dense index into `[0, COUNT)` for this key.
    fn index(self) -> usize;

    /// Wire-level key id stored in [`crate::wire::ItemRecord::key`].
    fn wire_key(self) -> i16 {
        self.index() as i16
    }
}

/// Declares a plain enum and its [`RecorderKey`] impl in one shot.
///
/// ```
/// telemetry_recorder::recorder_key! {
///     pub enum EngineKey {
///         Rpm,
///         OilTempC,
///         ThrottlePct,
///     }
/// }
/// assert_eq!(EngineKey::COUNT, 3);
/// ```
#[macro_export]
macro_rules! recorder_key {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        $vis enum $name {
            $($variant),+
        }

        impl $crate::key::RecorderKey for $name {
            const COUNT: usize = [$($name::$variant),+].len();

            fn index(self) -> usize {
                // Fieldless enum with no explicit discriminants: variant
                // order is declaration order, matching COUNT's array above.
                self as usize
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::RecorderKey;

    recorder_key! {
        enum Axis { X, Y, Z }
    }

    #[test]
    fn indices_are_dense() {
        assert_eq!(Axis::COUNT, 3);
        assert_eq!(Axis::X.index(), 0);
        assert_eq!(Axis::Y.index(), 1);
        assert_eq!(Axis::Z.index(), 2);
    }
}
