//! Shared test support: a scripted, recording transport that stands in for
//! the live HTTP adapter.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use adt_rs::{
    AdtError, AdtResponse, AuthMaterial, Engine, Method, RequestOptions, SafetyPolicy,
    SystemEndpoint, Transport,
};

/// A canned reply for one matched request.
#[derive(Debug, Clone)]
pub enum Reply {
    Ok(String),
    AlreadyExists(String),
    NotFound(String),
    LockConflict(String),
    Server(String),
}

impl Reply {
    fn produce(&self) -> Result<AdtResponse, AdtError> {
        match self {
            Reply::Ok(body) => Ok(AdtResponse {
                status: 200,
                body: body.clone(),
                content_type: None,
            }),
            Reply::AlreadyExists(message) => Err(AdtError::AlreadyExists(message.clone())),
            Reply::NotFound(message) => Err(AdtError::NotFound(message.clone())),
            Reply::LockConflict(message) => Err(AdtError::LockConflict(message.clone())),
            Reply::Server(message) => Err(AdtError::Server {
                status: 500,
                message: message.clone(),
            }),
        }
    }
}

struct Rule {
    method: Method,
    path_contains: String,
    query_contains: Option<(String, String)>,
    replies: Vec<Reply>,
    hits: usize,
}

/// One recorded request.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<String>,
}

impl Recorded {
    pub fn has_query(&self, key: &str, value: &str) -> bool {
        self.query.iter().any(|(k, v)| k == key && v == value)
    }
}

/// First-match-wins scripted transport. Unmatched requests panic, so every
/// network interaction a test triggers must be declared.
#[derive(Default)]
pub struct MockTransport {
    rules: Mutex<Vec<Rule>>,
    log: Mutex<Vec<Recorded>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(MockTransport::default())
    }

    /// Register a rule; later calls with the same matcher add sequential
    /// replies (the last one repeats).
    pub fn on(self: &Arc<Self>, method: Method, path_contains: &str, reply: Reply) -> Arc<Self> {
        self.on_query(method, path_contains, None, reply)
    }

    pub fn on_action(
        self: &Arc<Self>,
        method: Method,
        path_contains: &str,
        action: &str,
        reply: Reply,
    ) -> Arc<Self> {
        self.on_query(
            method,
            path_contains,
            Some(("_action".to_string(), action.to_string())),
            reply,
        )
    }

    fn on_query(
        self: &Arc<Self>,
        method: Method,
        path_contains: &str,
        query_contains: Option<(String, String)>,
        reply: Reply,
    ) -> Arc<Self> {
        let mut rules = self.rules.lock().unwrap();
        if let Some(rule) = rules.iter_mut().find(|rule| {
            rule.method == method
                && rule.path_contains == path_contains
                && rule.query_contains == query_contains
        }) {
            rule.replies.push(reply);
        } else {
            rules.push(Rule {
                method,
                path_contains: path_contains.to_string(),
                query_contains,
                replies: vec![reply],
                hits: 0,
            });
        }
        self.clone()
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.log.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    /// Recorded requests whose path contains `fragment`.
    pub fn requests_to(&self, fragment: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.path.contains(fragment))
            .collect()
    }

    /// Index of the first recorded request matching (method, fragment).
    pub fn position_of(&self, method: Method, fragment: &str) -> Option<usize> {
        self.requests()
            .iter()
            .position(|r| r.method == method && r.path.contains(fragment))
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(&self, path: &str, options: RequestOptions) -> Result<AdtResponse, AdtError> {
        self.log.lock().unwrap().push(Recorded {
            method: options.method,
            path: path.to_string(),
            query: options.query.clone(),
            body: options.body.clone(),
        });

        let mut rules = self.rules.lock().unwrap();
        // Most specific rule wins: a query-constrained match beats an
        // unconstrained one, then the longest path fragment.
        let best = rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| {
                rule.method == options.method
                    && path.contains(&rule.path_contains)
                    && rule
                        .query_contains
                        .as_ref()
                        .map(|(key, value)| {
                            options.query.iter().any(|(k, v)| k == key && v == value)
                        })
                        .unwrap_or(true)
            })
            .max_by_key(|(_, rule)| (rule.query_contains.is_some(), rule.path_contains.len()))
            .map(|(index, _)| index);
        match best.map(|index| &mut rules[index]) {
            Some(rule) => {
                let index = rule.hits.min(rule.replies.len() - 1);
                rule.hits += 1;
                rule.replies[index].produce()
            }
            None => panic!(
                "unscripted request: {} {} (query {:?})",
                options.method.as_str(),
                path,
                options.query
            ),
        }
    }
}

pub fn test_endpoint() -> SystemEndpoint {
    SystemEndpoint::new(
        "http://a4h.example.com:50000",
        "001",
        "EN",
        false,
        AuthMaterial::Basic {
            username: "DEVELOPER".into(),
            password: "secret".into(),
        },
    )
    .unwrap()
}

pub fn engine_with(transport: Arc<MockTransport>, safety: SafetyPolicy) -> Engine {
    Engine::with_transport(transport, test_endpoint(), safety)
}

/// A permissive policy that still exercises the transportable-edit guard.
pub fn permissive_policy() -> SafetyPolicy {
    SafetyPolicy {
        allow_transportable_edits: true,
        ..SafetyPolicy::unrestricted()
    }
}

/// Lock result body in the ABAP serialization envelope.
pub fn lock_body(handle: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<asx:abap xmlns:asx="http://www.sap.com/abapxml" version="1.0">
  <asx:values>
    <DATA>
      <LOCK_HANDLE>{handle}</LOCK_HANDLE>
      <CORRNR/>
      <CORRUSER>DEVELOPER</CORRUSER>
      <CORRTEXT/>
      <IS_LOCAL>X</IS_LOCAL>
      <IS_LINK_UP/>
      <MODIFICATION_SUPPORT/>
    </DATA>
  </asx:values>
</asx:abap>"#
    )
}

/// A check run report with the given messages as (severity, text).
pub fn checkrun_body(messages: &[(&str, &str)]) -> String {
    let mut items = String::new();
    for (severity, text) in messages {
        items.push_str(&format!(
            r#"<chkrun:checkMessage chkrun:uri="/sap/bc/adt/x/source/main#start=1,0" chkrun:type="{severity}" chkrun:shortText="{text}"/>"#
        ));
    }
    format!(
        r#"<?xml version="1.0"?>
<chkrun:checkRunReports xmlns:chkrun="http://www.sap.com/adt/checkrun">
  <chkrun:checkReport chkrun:reporter="abapCheckRun">
    <chkrun:checkMessageList>{items}</chkrun:checkMessageList>
  </chkrun:checkReport>
</chkrun:checkRunReports>"#
    )
}

/// An activation response listing still-inactive objects as (uri, name).
pub fn activation_body(inactive: &[(&str, &str)]) -> String {
    if inactive.is_empty() {
        return String::new();
    }
    let mut entries = String::new();
    for (uri, name) in inactive {
        entries.push_str(&format!(
            r#"<entry><object><ref adtcore:uri="{uri}" adtcore:type="" adtcore:name="{name}"/></object></entry>"#
        ));
    }
    format!(
        r#"<?xml version="1.0"?>
<chkl:messages xmlns:chkl="http://www.sap.com/abapxml/checklist" xmlns:adtcore="http://www.sap.com/adt/core">
  <inactiveObjects>{entries}</inactiveObjects>
</chkl:messages>"#
    )
}
