//! In-memory transport replaying a scripted sequence of replies. Test only.

use std::collections::VecDeque;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::anyhow;
use anyhow::Result;
use async_trait::async_trait;
use chrono::TimeZone;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::time::Duration;

use crate::domain::models::Session;
use crate::domain::models::SessionKind;
use crate::domain::models::SessionTransport;
use crate::domain::models::TransportBox;
use crate::domain::models::TransportName;

pub fn session(id: &str, state: &str) -> Session {
    return Session {
        id: id.to_string(),
        state: state.to_string(),
        kind: SessionKind::Persistent,
        created_at: Utc.with_ymd_and_hms(2023, 10, 21, 14, 3, 11).unwrap(),
        last_seen: None,
        owner: "alice".to_string(),
    };
}

#[derive(Clone)]
struct Reply {
    delay: Duration,
    res: Result<Vec<Session>, String>,
}

/// Pops one reply per fetch. Once the script runs out the last reply is
/// repeated.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Reply>>,
    last: Mutex<Option<Reply>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Arc<ScriptedTransport> {
        return Arc::new(ScriptedTransport::default());
    }

    /// Scripts one reply per state, each containing the session `id` only.
    pub fn with_states(id: &str, states: &[&str]) -> Arc<ScriptedTransport> {
        let transport = ScriptedTransport::new();
        for state in states {
            transport.reply(vec![session(id, state)]);
        }

        return transport;
    }

    pub fn reply(&self, sessions: Vec<Session>) -> &ScriptedTransport {
        return self.reply_after(Duration::ZERO, sessions);
    }

    pub fn reply_after(&self, delay: Duration, sessions: Vec<Session>) -> &ScriptedTransport {
        self.script.lock().push_back(Reply {
            delay,
            res: Ok(sessions),
        });

        return self;
    }

    pub fn fail(&self, message: &str) -> &ScriptedTransport {
        return self.fail_after(Duration::ZERO, message);
    }

    pub fn fail_after(&self, delay: Duration, message: &str) -> &ScriptedTransport {
        self.script.lock().push_back(Reply {
            delay,
            res: Err(message.to_string()),
        });

        return self;
    }

    pub fn calls(&self) -> usize {
        return self.calls.load(Ordering::SeqCst);
    }

    pub fn boxed(self: &Arc<ScriptedTransport>) -> TransportBox {
        return Arc::clone(self) as TransportBox;
    }

    fn next_reply(&self) -> Option<Reply> {
        let mut last = self.last.lock();
        if let Some(reply) = self.script.lock().pop_front() {
            *last = Some(reply);
        }

        return last.clone();
    }
}

#[async_trait]
impl SessionTransport for ScriptedTransport {
    fn name(&self) -> TransportName {
        return TransportName::File;
    }

    #[allow(clippy::implicit_return)]
    async fn health_check(&self) -> Result<()> {
        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn fetch_sessions(&self) -> Result<Vec<Session>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let reply = match self.next_reply() {
            Some(reply) => reply,
            None => return Ok(vec![]),
        };

        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }

        return reply.res.map_err(|err| return anyhow!(err));
    }
}
