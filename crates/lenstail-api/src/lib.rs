pub mod auth;
pub mod catalog;

pub use auth::OauthTokenProvider;
pub use catalog::GraphqlCatalogFetcher;
