pub mod client;
pub mod codec;
pub mod error;
pub mod msg;
pub mod paths;

pub use client::{BrokerConfig, FabricClient, MqCallback, MqClient, SslCertReqs};
pub use codec::{decode, encode};
pub use error::FabricError;
pub use msg::{
    CmdDesc, MsgCmd, MsgFile, MsgFlow, MsgProvider, MsgRequest, MsgResponse, MsgWorker, ParamDesc,
    ParamValue,
};
