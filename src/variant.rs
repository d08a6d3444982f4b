//! Closed backend tag enumerations
//!
//! [`auto_number!`] declares a fieldless enum from one ordered list of
//! variants. Ordinals follow the declaration order, start at zero and have no
//! gaps, so they can index compact dispatch tables. A variant listed twice is
//! a compile error, and no ordinal is ever handed out at run time.

use crate::error::HybridError;

/// Common surface of every [`auto_number!`] enumeration.
pub trait AutoNumber: Copy + Eq + Sized + 'static {
    /// Every variant in declaration order.
    const ALL: &'static [Self];
    const COUNT: usize;

    fn ordinal(self) -> usize;
    fn name(self) -> &'static str;

    fn from_ordinal(ordinal: usize) -> Option<Self> {
        Self::ALL.get(ordinal).copied()
    }
}

/// Declare a closed enumeration whose ordinals follow declaration order.
///
/// ```
/// hybrid_nd::auto_number! {
///     /// Colours.
///     pub enum Colour {
///         Red => "red",
///         Green => "green",
///     }
/// }
///
/// use hybrid_nd::variant::AutoNumber;
/// assert_eq!(Colour::Red.ordinal(), 0);
/// assert_eq!(Colour::Green.ordinal(), 1);
/// assert_eq!(Colour::from_ordinal(1), Some(Colour::Green));
/// ```
///
/// Labels must be distinct so that `Display` and `FromStr` round-trip:
///
/// ```compile_fail
/// hybrid_nd::auto_number! {
///     pub enum Twice {
///         A => "same",
///         B => "same",
///     }
/// }
/// ```
#[macro_export]
macro_rules! auto_number {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(u8)]
        $vis enum $name {
            $($(#[$vmeta])* $variant),+
        }

        const _: () = assert!(
            $crate::variant::labels_unique(&[$($label),+]),
            concat!("duplicate label in ", stringify!($name))
        );

        impl $crate::variant::AutoNumber for $name {
            const ALL: &'static [Self] = &[$($name::$variant),+];
            const COUNT: usize = <Self as $crate::variant::AutoNumber>::ALL.len();

            fn ordinal(self) -> usize {
                self as usize
            }

            fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str($crate::variant::AutoNumber::name(*self))
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::error::HybridError;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                $crate::variant::parse_variant(s)
            }
        }
    };
}

/// True when no two labels are equal. Evaluated at compile time by
/// [`auto_number!`].
#[doc(hidden)]
pub const fn labels_unique(labels: &[&str]) -> bool {
    let mut i = 0;
    while i < labels.len() {
        let mut j = i + 1;
        while j < labels.len() {
            if str_eq(labels[i], labels[j]) {
                return false;
            }
            j += 1;
        }
        i += 1;
    }
    true
}

const fn str_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}

/// Look a variant up by its label.
pub fn parse_variant<T: AutoNumber>(s: &str) -> Result<T, HybridError> {
    T::ALL
        .iter()
        .copied()
        .find(|v| v.name() == s)
        .ok_or_else(|| HybridError::InvalidParameter(format!("unknown variant '{s}'")))
}

auto_number! {
    /// Array representation kinds.
    pub enum ArrayType {
        PlainArray => "plain-array",
        SymbolicGraph => "symbolic-graph",
    }
}

auto_number! {
    /// Function/operator representation kinds.
    ///
    /// Distinct from [`ArrayType`] even though every backend today pairs the
    /// two one-to-one.
    pub enum FunctionType {
        PlainArray => "plain-array",
        SymbolicGraph => "symbolic-graph",
    }
}

/// Fixed-size table indexed by an [`AutoNumber`] ordinal.
#[derive(Debug, Clone)]
pub struct OrdinalMap<K: AutoNumber, V> {
    slots: Vec<Option<V>>,
    _key: std::marker::PhantomData<K>,
}

impl<K: AutoNumber, V> OrdinalMap<K, V> {
    pub fn new() -> Self {
        OrdinalMap {
            slots: (0..K::COUNT).map(|_| None).collect(),
            _key: std::marker::PhantomData,
        }
    }

    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.slots.get_mut(key.ordinal()).and_then(|s| s.replace(value))
    }

    pub fn get(&self, key: K) -> Option<&V> {
        self.slots.get(key.ordinal()).and_then(Option::as_ref)
    }

    pub fn contains(&self, key: K) -> bool {
        self.get(key).is_some()
    }
}

impl<K: AutoNumber, V> Default for OrdinalMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
