//! Outbound integrations. Each client is a trait with one HTTP-backed implementation so
//! handlers and jobs can be exercised against in-memory fakes.

pub mod discord;
pub mod facebook;
pub mod geo;
pub mod google;
pub mod mailer;
pub mod sendy;

pub use discord::{DiscordApi, DiscordState, HttpDiscordClient};
pub use facebook::{FacebookApi, FacebookState, GraphClient};
pub use geo::{Geolocator, GeolocatorState, IpGeolocationClient};
pub use google::{GoogleTokenVerifier, IdTokenVerifier, VerifierState};
pub use mailer::{Mailer, MailerState, MockMailer, OutgoingEmail, SesMailer};
pub use sendy::{HttpSendyClient, SendyClient, SendyState};
