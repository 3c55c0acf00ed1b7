extern crate pest;
#[macro_use]
extern crate pest_derive;
pub mod card_error;
pub mod numeric;
pub(crate) mod parsing;
pub mod layout;
pub mod codec;
pub mod continuation;
pub mod cards;
pub mod card_set;
pub mod parfile;
pub mod model;

pub use card_error::{CardError, CardResult};
pub use card_set::{CardFamily, CardSet};
pub use codec::{CodecSettings, RecordCodec};
pub use numeric::VaryFlag;
pub use parfile::ParameterFile;
pub use model::ParameterModel;
