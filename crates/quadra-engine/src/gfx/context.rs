use std::cell::RefCell;
use std::panic::Location;
use std::rc::Rc;

use super::api::{GraphicsApi, RawHandle};

/// Shared, single-threaded access to the graphics driver.
///
/// Cloning is cheap. Every resource keeps a clone so it can release its handle
/// when dropped, which ties the driver's lifetime to the last live resource.
#[derive(Clone)]
pub struct Context {
    api: Rc<RefCell<dyn GraphicsApi>>,
}

impl Context {
    pub fn new<A>(api: A) -> Self
    where
        A: GraphicsApi + 'static,
    {
        Self { api: Rc::new(RefCell::new(api)) }
    }

    /// Wraps an already shared driver, e.g. one the runtime also drives
    /// directly for frame acquisition and presentation.
    pub fn from_shared(api: Rc<RefCell<dyn GraphicsApi>>) -> Self {
        Self { api }
    }

    /// Runs one driver call and reports every error it raised.
    ///
    /// Errors still pending from earlier calls are reported first, tagged as
    /// stale, so they are not attributed to `what`. Errors never propagate:
    /// they are logged with the call text and the caller's location.
    ///
    /// Prefer the [`gfx_call!`](crate::gfx::gfx_call) macro, which fills in
    /// `what` from the call expression.
    #[track_caller]
    pub fn call<R>(&self, what: &str, f: impl FnOnce(&mut dyn GraphicsApi) -> R) -> R {
        let at = Location::caller();
        let mut api = self.api.borrow_mut();

        while let Some(err) = api.take_error() {
            log::warn!("[gfx] stale error before `{what}` ({}:{}): {err}", at.file(), at.line());
        }

        let out = f(&mut *api);

        while let Some(err) = api.take_error() {
            log::error!("[gfx] {err}\n  call: {what}\n  at:   {}:{}", at.file(), at.line());
        }

        out
    }
}

/// Runs a driver call through [`Context::call`], using the call expression
/// itself as the diagnostic label.
///
/// ```ignore
/// let handle = gfx_call!(ctx, api => api.create_buffer());
/// ```
macro_rules! gfx_call {
    ($ctx:expr, $api:ident => $call:expr) => {
        $ctx.call(stringify!($call), |$api| $call)
    };
}

pub(crate) use gfx_call;

/// Exclusive owner of one driver handle.
///
/// Not `Clone`: the handle is released exactly once, when the owner drops.
/// Moving the owner moves the responsibility with it.
pub(crate) struct OwnedHandle {
    raw: RawHandle,
    ctx: Context,
    release: fn(&mut dyn GraphicsApi, RawHandle),
    label: &'static str,
}

impl OwnedHandle {
    pub(crate) fn new(
        ctx: &Context,
        raw: RawHandle,
        label: &'static str,
        release: fn(&mut dyn GraphicsApi, RawHandle),
    ) -> Self {
        Self { raw, ctx: ctx.clone(), release, label }
    }

    #[inline]
    pub(crate) fn raw(&self) -> RawHandle {
        self.raw
    }

    #[inline]
    pub(crate) fn ctx(&self) -> &Context {
        &self.ctx
    }
}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        let (raw, release) = (self.raw, self.release);
        log::trace!("releasing {} {raw}", self.label);
        self.ctx.call(self.label, |api| release(api, raw));
    }
}

impl std::fmt::Debug for OwnedHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.label, self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::api::{BufferTarget, DriverError};
    use crate::gfx::testing::{spy_context, Call};

    #[test]
    fn call_drains_every_error_and_keeps_going() {
        let (ctx, spy) = spy_context();
        spy.borrow_mut().inject_error(DriverError::InvalidValue("stale".into()));

        let handle = gfx_call!(ctx, api => api.create_buffer());
        spy.borrow_mut().inject_error(DriverError::OutOfMemory);
        spy.borrow_mut().inject_error(DriverError::InvalidOperation("second".into()));
        gfx_call!(ctx, api => api.bind_buffer(BufferTarget::Array, Some(handle)));

        assert_eq!(spy.borrow().pending_errors(), 0);
        assert!(spy.borrow().calls.contains(&Call::BindBuffer(BufferTarget::Array, Some(handle.get()))));
    }

    #[test]
    fn owned_handle_releases_once_after_move() {
        let (ctx, spy) = spy_context();
        let raw = gfx_call!(ctx, api => api.create_buffer());
        let owned = OwnedHandle::new(&ctx, raw, "delete_buffer", |api, h| api.delete_buffer(h));

        let moved = vec![owned];
        assert_eq!(spy.borrow().release_count(raw), 0);
        drop(moved);

        assert_eq!(spy.borrow().release_count(raw), 1);
        assert_eq!(spy.borrow().live(), 0);
    }
}
