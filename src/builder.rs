//! Typestate markers for builders with required parameters
//!
//! A builder starts with every required field as [`Unset`] and only offers
//! its `build` method once all of them are [`Set`], so a service without a
//! network or a checkpoint store does not compile.

use std::marker::PhantomData;

/// A required builder field that has not been provided yet.
///
/// Carries no value, only the type the field will eventually hold.
pub struct Unset<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for Unset<T> {
    fn default() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Unset<T> {
    /// Creates a new unset field.
    pub fn new() -> Self {
        Self::default()
    }
}

/// A required builder field that has been provided.
#[derive(Debug, Clone)]
pub struct Set<T> {
    value: T,
}

impl<T> Set<T> {
    /// Creates a set field holding `value`.
    ///
    /// # Parameters
    /// * `value` - The value the builder was given for this field
    pub fn new(value: T) -> Self {
        Self { value }
    }

    /// Consumes the field, typically in a builder's `build` method.
    ///
    /// # Returns
    /// The value the field was set to
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Borrows the value, e.g. to record it in a tracing span before `build`
    /// consumes the builder.
    ///
    /// # Returns
    /// A reference to the value the field was set to
    pub fn as_ref_inner(&self) -> &T {
        &self.value
    }
}
