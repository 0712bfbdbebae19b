#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![doc = include_str!("../README.md")]
#![cfg_attr(
    feature = "document-features",
    doc = document_features::document_features!()
)]

pub mod cancel;
pub mod config;
mod seq;
mod waiter;

pub use {
    self::{
        cancel::{CancelReason, Cancellation},
        config::{FirstSeq, WaiterConfig},
        seq::*,
        waiter::*,
    },
    futures, octs,
};
