//! [`Command`] definition.

pub mod cancel_booking;
pub mod confirm_booking;
pub mod decline_booking;
pub mod request_amendment;
pub mod request_booking;
pub mod revise_booking;
pub mod submit_rating;

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    cancel_booking::CancelBooking, confirm_booking::ConfirmBooking,
    decline_booking::DeclineBooking, request_amendment::RequestAmendment,
    request_booking::RequestBooking, revise_booking::ReviseBooking,
    submit_rating::SubmitRating,
};
