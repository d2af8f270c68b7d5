use std::{
    cell::{BorrowMutError, Ref, RefCell, RefMut},
    rc::Rc,
};

/// A single-threaded, reference-counted container for an engine system.
///
/// `StSystem` is how long-lived systems such as the buffer registry are shared
/// between the world, every chunk, and the renderer. It wraps the system in
/// `Rc<RefCell<Box<T>>>`, so it is cheap to clone and deliberately `!Send`:
/// everything that touches a shared system runs on the render/update thread.
///
/// # Type Parameters
/// - `T`: The type of the contained system, may be unsized
///
/// # Examples
///
/// ```
/// use voxel_chunk_engine::core::StSystem;
///
/// let counter = StSystem::new(Box::new(0u32));
/// let shared = counter.clone();
///
/// **shared.get_mut() += 1;
/// assert_eq!(**counter.get(), 1);
/// ```
///
/// # Panics
/// - `get` panics if the system is currently mutably borrowed
/// - `get_mut` panics if the system is currently borrowed at all
pub struct StSystem<T: ?Sized> {
    pub system: Rc<RefCell<Box<T>>>,
}

impl<T: ?Sized> StSystem<T> {
    /// Creates a new `StSystem` containing the given boxed system.
    ///
    /// # Arguments
    /// * `system` - The system to be stored, boxed
    pub fn new(system: Box<T>) -> Self {
        Self {
            system: Rc::new(RefCell::new(system)),
        }
    }

    /// Returns an immutable reference to the contained system.
    ///
    /// # Panics
    /// Panics if the value is currently mutably borrowed.
    pub fn get(&self) -> Ref<'_, Box<T>> {
        self.system.borrow()
    }

    /// Returns a mutable reference to the contained system.
    ///
    /// # Panics
    /// Panics if the value is currently borrowed.
    pub fn get_mut(&self) -> RefMut<'_, Box<T>> {
        self.system.borrow_mut()
    }

    /// Attempts to mutably borrow the contained system without panicking.
    ///
    /// Used from `Drop` implementations, where a second panic would abort.
    pub fn try_get_mut(&self) -> Result<RefMut<'_, Box<T>>, BorrowMutError> {
        self.system.try_borrow_mut()
    }

    /// Returns `true` if both handles point at the same system.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.system, &other.system)
    }
}

impl<T: ?Sized> Clone for StSystem<T> {
    fn clone(&self) -> Self {
        Self {
            system: self.system.clone(),
        }
    }
}
