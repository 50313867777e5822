//! cindergrid-ipam: address allocation for virtual networks.
//!
//! Each network's CIDR block is owned by one [`Ipam`] entity built on the
//! distributed object model (`created` to `deleted`, terminal). Reservations
//! live one record per address so the table never needs a whole-block
//! read-modify-write; releases pass through a deletion halo before the
//! address can be handed out again.

pub mod block;
pub mod error;
pub mod ipam;
pub mod reservation;

pub use block::IpBlock;
pub use error::{IpamError, IpamResult};
pub use ipam::{IPAM_TYPE, Ipam, ipam_spec};
pub use reservation::{Reservation, ReservationType};
