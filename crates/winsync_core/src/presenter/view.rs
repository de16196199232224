//! View contract.
//!
//! A view renders values and reports user actions; it never holds the
//! authoritative record state. Every `View` method is called on the view's
//! own `ViewContext`.

use crate::model::property_name::{PropertyName, RowId};
use crate::model::value::PropertyValue;
use crate::model::value_set::PropertyValueSet;
use crate::window::navigation::OnChangesFound;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Visual side of a window.
///
/// Implementations must not call back into their listener from inside one
/// of the push methods below. `commit_changes` is the exception: it runs
/// before the model is touched and may report pending edits.
pub trait View: Send + Sync {
    /// Replaces every displayed value present in `values`.
    fn set_properties(&self, values: &PropertyValueSet);
    fn set_property(&self, name: &PropertyName, value: &PropertyValue);
    fn set_grid_property(
        &self,
        grid: &PropertyName,
        row: &RowId,
        cell: &PropertyName,
        value: &PropertyValue,
    );
    fn grid_new_row(&self, grid: &PropertyName, row: &RowId, values: &PropertyValueSet);
    fn set_previous_record_enabled(&self, enabled: bool);
    fn set_next_record_enabled(&self, enabled: bool);
    fn show_error(&self, message: &str);
    /// Asks the user whether unsaved edits may be dropped. The answer comes
    /// back through `ViewListener::view_discard_changes_confirmed`.
    fn confirm_discard_changes(&self);
    /// Flushes edits still held by input widgets.
    fn commit_changes(&self);
    fn set_listener(&self, listener: Option<Arc<dyn ViewListener>>);
}

/// User actions reported by a view.
pub trait ViewListener: Send + Sync {
    fn view_property_changed(&self, name: &PropertyName, value: PropertyValue);
    fn view_grid_property_changed(
        &self,
        grid: &PropertyName,
        row: &RowId,
        cell: &PropertyName,
        value: PropertyValue,
    );
    fn view_next_record(&self, policy: OnChangesFound);
    fn view_previous_record(&self, policy: OnChangesFound);
    fn view_save_editing(&self);
    fn view_cancel_editing(&self);
    /// Replaces the set of names the view displays.
    fn view_subscribe_to_value_changes(&self, names: Vec<PropertyName>);
    fn view_discard_changes_confirmed(&self, confirmed: bool);
    fn view_request_value(&self, name: &PropertyName) -> ValueFuture;
    fn view_request_grid_value(
        &self,
        grid: &PropertyName,
        row: &RowId,
        cell: &PropertyName,
    ) -> ValueFuture;
}

/// Value answer that is already resolved.
///
/// Can be awaited (ready on first poll) or read synchronously.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValueFuture {
    value: PropertyValue,
}

impl ValueFuture {
    pub fn ready(value: PropertyValue) -> Self {
        Self { value }
    }

    pub fn value(&self) -> &PropertyValue {
        &self.value
    }

    pub fn into_value(self) -> PropertyValue {
        self.value
    }
}

impl Future for ValueFuture {
    type Output = PropertyValue;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        Poll::Ready(std::mem::take(&mut self.value))
    }
}

#[cfg(test)]
mod tests {
    use super::ValueFuture;
    use crate::model::value::PropertyValue;
    use std::future::Future;
    use std::pin::pin;
    use std::sync::Arc;
    use std::task::{Context, Poll, Wake, Waker};

    struct NoopWake;

    impl Wake for NoopWake {
        fn wake(self: Arc<Self>) {}
    }

    #[test]
    fn value_future_is_ready_on_first_poll() {
        let waker = Waker::from(Arc::new(NoopWake));
        let mut cx = Context::from_waker(&waker);
        let mut future = pin!(ValueFuture::ready(PropertyValue::Number(4.0)));

        assert_eq!(
            future.as_mut().poll(&mut cx),
            Poll::Ready(PropertyValue::Number(4.0))
        );
    }

    #[test]
    fn value_future_reads_synchronously() {
        let future = ValueFuture::ready(PropertyValue::text("draft"));
        assert_eq!(future.value(), &PropertyValue::text("draft"));
        assert_eq!(future.into_value(), PropertyValue::text("draft"));
    }
}
