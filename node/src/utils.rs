//! Various functions that are not limited to a particular module, but are too small to warrant
//! being factored out into standalone crates.

use std::{
    cell::RefCell,
    fmt::{self, Display, Formatter},
};

/// Helper struct for printing collections of displayable items.
///
/// Lazily turns an iterator into a comma-separated list; the iterator is consumed on first use.
pub struct DisplayIter<T>(RefCell<Option<T>>);

impl<T> DisplayIter<T> {
    /// Creates a new `DisplayIter` from the given iterator.
    pub fn new(item: T) -> Self {
        DisplayIter(RefCell::new(Some(item)))
    }
}

impl<I, T> Display for DisplayIter<I>
where
    I: IntoIterator<Item = T>,
    T: Display,
{
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if let Some(src) = self.0.borrow_mut().take() {
            let mut first = true;
            for item in src.into_iter().take(f.width().unwrap_or(usize::MAX)) {
                if first {
                    first = false;
                    write!(f, "{}", item)?;
                } else {
                    write!(f, ", {}", item)?;
                }
            }

            Ok(())
        } else {
            write!(f, "DisplayIter:GONE")
        }
    }
}
