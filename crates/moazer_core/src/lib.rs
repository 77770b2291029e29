pub mod consultation;
pub mod domain;
pub mod error;
pub mod memory;
pub mod ports;
pub mod wallet;
pub mod wizard;

pub use consultation::{ConsultationAction, ConsultationService};
pub use domain::{Owner, Role, Session, SessionKind, User, UserCredentials, AuthSession};
pub use error::{MoazerError, MoazerResult};
pub use memory::InMemoryDatabase;
pub use ports::{DatabaseService, Oracle, PortError, PortResult};
pub use wallet::WalletService;
pub use wizard::SessionWizard;
