pub mod invoices;
pub mod public;
pub mod webhooks;
