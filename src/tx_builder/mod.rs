//! Transaction dispatch for operation groups
//!
//! - **group**: the tagged unit of submission
//! - **instructions**: priority fees and packet-size packing
//! - **dispatcher**: sequential sign/submit/confirm of a group list
//! - **poller**: confirmation polling with resubmission until expiry

pub mod dispatcher;
pub mod group;
pub mod instructions;
pub mod poller;

pub use dispatcher::{BundleDispatcher, DispatchOptions, GroupState};
pub use group::{group_kinds, GroupKind, GroupPayload, OperationGroup};
pub use instructions::{fits_in_packet, pack_instructions, transaction_size, with_priority_fee};
pub use poller::{Confirmation, ConfirmationPoller};
