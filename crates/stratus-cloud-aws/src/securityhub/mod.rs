//! AWS Security Hub

pub mod account;

pub use account::{
    AccountConfig, AccountModel, ControlFindingGenerator, Hub, SecurityHubAccount,
    SecurityHubApi,
};
