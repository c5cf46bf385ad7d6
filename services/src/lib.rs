//! Attendance validation and certificate issuance for academic events.

pub mod certificates;
pub mod check_in;
pub mod eligibility;
pub mod error;
pub mod events;
pub mod geo;
pub mod identity;
pub mod keywords;
pub mod lookup;

#[cfg(test)]
mod test_support;

pub use certificates::{CertificateIssuer, IssuanceFailure, IssuanceReport};
pub use check_in::{CheckInProtocol, CheckInRequest, Claimant};
pub use eligibility::{Eligibility, EligibilityCalculator, EventAttendance};
pub use error::{CheckInError, CheckInRejection, EventError, IssuanceError, KeywordError};
pub use events::{Approval, EventService, NewEvent};
pub use geo::GeoPoint;
pub use identity::{IdentityProvider, NoSession, SessionUser};
pub use keywords::KeywordDirectory;
pub use lookup::{CertificateLookup, CertificateView};
