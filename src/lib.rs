//! Main crate for the `simplelogin-route53-helper` application.
//!
//! The helper connects custom domains hosted in AWS Route53 to SimpleLogin: it publishes the DNS records
//! SimpleLogin asks for, waits for SimpleLogin to verify each of them and then creates a set of aliases per domain.
//!
//! For more information, choose one of the modules below.
//! The following modules might be of interest if you want to add new functionality:
//! - [`aliasservice`] talks to the SimpleLogin API and implements the alias operations
//! - [`provider`]s are DNS providers such as Route53 that host the zones of our domains
//! - [`mailrecords`] knows which records SimpleLogin needs and upserts them through a provider
//! - [`setup`] and [`provision`] are the two workflows driven by the command line tool

#![allow(clippy::uninlined_format_args)]

pub mod aliasservice;
pub mod config;
pub mod mailrecords;
pub mod poll;
pub mod provider;
pub mod provision;
pub mod setup;
