//! Data structures representing database entities.

pub mod event;
pub mod meetup;
pub mod offer;
pub mod order;
pub mod product;

pub use event::{Event, EventCategory, EventLocation, EventRegistration, RegistrationStatus};
pub use meetup::{AttendeeStatus, Meetup, MeetupAttendee, MeetupCategory};
pub use offer::{Offer, OfferKind};
pub use order::{ChosenCustomization, Order, OrderItem, OrderStatus, PaymentStatus, ShippingAddress};
pub use product::{CustomOption, CustomOptionKind, Product, ProductCategory};
