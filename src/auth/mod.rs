pub mod whitelist;

pub use whitelist::Whitelist;
