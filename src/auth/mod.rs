// SSO authentication: page analysis, credential encryption, redirect walking and the login state machine.

pub mod core;
pub mod encryptor;
pub mod login;
pub mod redirects;
