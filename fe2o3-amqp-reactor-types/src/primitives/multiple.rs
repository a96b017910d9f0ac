use std::ops::Index;

use serde::{Deserialize, Serialize};

use super::Symbol;

/// A field that the peer may send either as a single value or as a list.
///
/// The shape is kept as received so that a single value is observed as a
/// single value on the remote side, while [`as_slice`](Multiple::as_slice)
/// gives the normalized sequence view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Multiple<T> {
    /// A single value
    Single(T),

    /// An ordered list of values
    Many(Vec<T>),
}

impl<T> Multiple<T> {
    /// Normalized sequence view. Index 0 is always the first value supplied
    pub fn as_slice(&self) -> &[T] {
        match self {
            Multiple::Single(value) => std::slice::from_ref(value),
            Multiple::Many(values) => values,
        }
    }

    /// Number of values
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Whether there is no value at all
    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    /// Iterates over the values in order
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    /// Returns the value at `index`
    pub fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }

    /// Returns the value if it was given as a single value
    pub fn as_single(&self) -> Option<&T> {
        match self {
            Multiple::Single(value) => Some(value),
            Multiple::Many(_) => None,
        }
    }

    /// Whether the value was given as a single value
    pub fn is_single(&self) -> bool {
        matches!(self, Multiple::Single(_))
    }

    /// Whether `value` is one of the values
    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: PartialEq<Q>,
        Q: ?Sized,
    {
        self.iter().any(|v| v == value)
    }

    /// Consumes into a `Vec`, losing the original shape
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Multiple::Single(value) => vec![value],
            Multiple::Many(values) => values,
        }
    }
}

impl<T> Index<usize> for Multiple<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        &self.as_slice()[index]
    }
}

impl<'a, T> IntoIterator for &'a Multiple<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T> From<T> for Multiple<T> {
    fn from(value: T) -> Self {
        Multiple::Single(value)
    }
}

impl<T> From<Vec<T>> for Multiple<T> {
    fn from(values: Vec<T>) -> Self {
        Multiple::Many(values)
    }
}

impl From<&str> for Multiple<Symbol> {
    fn from(value: &str) -> Self {
        Multiple::Single(Symbol::from(value))
    }
}

impl From<String> for Multiple<Symbol> {
    fn from(value: String) -> Self {
        Multiple::Single(Symbol::from(value))
    }
}

impl<const N: usize> From<[&str; N]> for Multiple<Symbol> {
    fn from(values: [&str; N]) -> Self {
        Multiple::Many(values.iter().map(|v| Symbol::from(*v)).collect())
    }
}

impl PartialEq<&str> for Multiple<Symbol> {
    fn eq(&self, other: &&str) -> bool {
        match self {
            Multiple::Single(value) => value == other,
            Multiple::Many(_) => false,
        }
    }
}

impl<const N: usize> PartialEq<[&str; N]> for Multiple<Symbol> {
    fn eq(&self, other: &[&str; N]) -> bool {
        match self {
            Multiple::Single(_) => false,
            Multiple::Many(values) => {
                values.len() == N && values.iter().zip(other.iter()).all(|(a, b)| a == b)
            }
        }
    }
}
