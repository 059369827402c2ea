/// Declare an entity's state enum.
///
/// The enum gets the derives every state needs, a `State` implementation
/// naming each variant after itself, and an `ALL` constant listing the
/// variants in declaration order. `ALL` is handy for declaring the full
/// state set of an aspect with
/// [`TableBuilder::declare_all`](crate::aspect::TableBuilder::declare_all).
///
/// ```
/// use permitflow::state_enum;
/// use permitflow::core::State;
///
/// state_enum! {
///     pub enum Hatch {
///         Closed,
///         Cycling,
///         Open,
///     }
/// }
///
/// assert_eq!(Hatch::Cycling.name(), "Cycling");
/// assert_eq!(Hatch::ALL, &[Hatch::Closed, Hatch::Cycling, Hatch::Open]);
/// ```
#[macro_export]
macro_rules! state_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant
            ),+
        }

        impl $name {
            #[allow(dead_code)]
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
        }

        impl $crate::core::State for $name {
            fn name(&self) -> &str {
                match self {
                    $(Self::$variant => stringify!($variant)),+
                }
            }
        }
    };
}
