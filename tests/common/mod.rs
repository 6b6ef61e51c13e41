#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::Notify;
use transmission_rpc::rpc::{Transport, TransportError, TransportReply};

/// One recorded transport attempt
#[derive(Debug, Clone)]
pub struct Sent {
    pub token: Option<String>,
    pub body: Vec<u8>,
}

impl Sent {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("request body is json")
    }

    pub fn tag(&self) -> u64 {
        self.json()["tag"].as_u64().expect("request carries a tag")
    }
}

/// Step in a transport script
pub enum Step {
    /// Answer with a fixed reply
    Reply(Result<TransportReply, TransportError>),
    /// Answer `{"result": "success", "arguments": ..}` echoing the request tag
    Echo(Value),
    /// Hold the attempt until the gate is notified, then answer
    Gated(Arc<Notify>, Result<TransportReply, TransportError>),
}

/// Transport that replays scripted replies and records every attempt.
#[derive(Default)]
pub struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    sent: Mutex<Vec<Sent>>,
}

impl ScriptedTransport {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }
}

pub fn expired(token: &str) -> Step {
    Step::Reply(Ok(TransportReply::expired(Some(token.to_string()))))
}

pub fn raw(body: Value) -> Step {
    Step::Reply(Ok(TransportReply::success(body.to_string().into_bytes())))
}

pub fn echo(arguments: Value) -> Step {
    Step::Echo(arguments)
}

pub fn gated(gate: &Arc<Notify>, reply: Step) -> Step {
    match reply {
        Step::Reply(reply) => Step::Gated(gate.clone(), reply),
        _ => panic!("only fixed replies can be gated"),
    }
}

impl Transport for ScriptedTransport {
    fn send<'a>(
        &'a self,
        session_token: Option<&'a str>,
        body: &'a [u8],
    ) -> BoxFuture<'a, Result<TransportReply, TransportError>> {
        let sent = Sent {
            token: session_token.map(str::to_owned),
            body: body.to_vec(),
        };
        let step = self.steps.lock().pop_front();
        let reply = match step {
            Some(Step::Gated(gate, reply)) => {
                self.sent.lock().push(sent);
                return Box::pin(async move {
                    gate.notified().await;
                    reply
                });
            }
            Some(Step::Reply(reply)) => reply,
            Some(Step::Echo(arguments)) => {
                let response = json!({
                    "result": "success",
                    "arguments": arguments,
                    "tag": sent.tag(),
                });
                Ok(TransportReply::success(response.to_string().into_bytes()))
            }
            None => Err(TransportError::Other("script exhausted".into())),
        };
        self.sent.lock().push(sent);
        Box::pin(async move { reply })
    }
}

/// Transport that echoes every request, holding `torrent-verify` until released.
#[derive(Default)]
pub struct GatedTransport {
    pub gate: Notify,
    sent: Mutex<Vec<Sent>>,
}

impl GatedTransport {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }
}

impl Transport for GatedTransport {
    fn send<'a>(
        &'a self,
        session_token: Option<&'a str>,
        body: &'a [u8],
    ) -> BoxFuture<'a, Result<TransportReply, TransportError>> {
        Box::pin(async move {
            let sent = Sent {
                token: session_token.map(str::to_owned),
                body: body.to_vec(),
            };
            let request = sent.json();
            self.sent.lock().push(sent);
            if request["method"] == "torrent-verify" {
                self.gate.notified().await;
            }
            let response = json!({
                "result": "success",
                "arguments": {"method": request["method"]},
                "tag": request["tag"],
            });
            Ok(TransportReply::success(response.to_string().into_bytes()))
        })
    }
}
