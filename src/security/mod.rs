pub mod token_manager;

pub use token_manager::{
    CredentialField, CredentialOrigin, CredentialResolver, ResolvedCredential,
    load_properties_file, mask_token,
};
