//! Expected load of a plan, weighted by session probability.

use crate::session::{Action, RequestNode, Session};
use crate::{Probability, Seconds};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatistics {
    pub name: String,
    pub probability: Probability,
    pub requests: usize,
    pub total_think: Seconds,
    /// `requests / total_think`; infinite or NaN for a session that never
    /// thinks.
    pub requests_per_second: f64,
}

impl SessionStatistics {
    pub fn from_session(session: &Session) -> SessionStatistics {
        let mut requests = 0;
        let mut total_think = 0.0;
        for action in session.actions() {
            match action {
                Action::Think(think) => total_think += think.seconds,
                Action::Transaction(transaction) => {
                    for node in transaction.requests() {
                        requests += match node {
                            RequestNode::Request(_) | RequestNode::Websocket(_) => 1,
                            RequestNode::If(statement) => statement.requests().len(),
                        };
                    }
                }
            }
        }

        SessionStatistics {
            name: session.name().to_owned(),
            probability: session.probability(),
            requests,
            total_think,
            requests_per_second: requests as f64 / total_think,
        }
    }

    fn weight(&self) -> f64 {
        f64::from(self.probability) / 100.0
    }
}

/// Share of the expected traffic that runs a transaction of this name.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionScore {
    pub name: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanStatistics {
    pub sessions: Vec<SessionStatistics>,
    pub weighted_average_requests_per_second: f64,
    pub weighted_average_session_length: Seconds,
    pub max_session_length: Seconds,
    /// Highest score first.
    pub transaction_scores: Vec<TransactionScore>,
}

impl PlanStatistics {
    pub fn from_sessions(sessions: &[Session]) -> PlanStatistics {
        let per_session: Vec<SessionStatistics> = sessions
            .iter()
            .map(SessionStatistics::from_session)
            .collect();

        let mut weighted_average_requests_per_second = 0.0;
        let mut weighted_average_session_length = 0.0;
        let mut max_session_length: Seconds = 0.0;
        for stats in &per_session {
            weighted_average_requests_per_second += stats.weight() * stats.requests_per_second;
            weighted_average_session_length += stats.weight() * stats.total_think;
            max_session_length = max_session_length.max(stats.total_think);
        }

        PlanStatistics {
            sessions: per_session,
            weighted_average_requests_per_second,
            weighted_average_session_length,
            max_session_length,
            transaction_scores: transaction_scores(sessions),
        }
    }
}

/// Scores every transaction name by the summed probability of the
/// sessions containing it, as a percentage of the summed probability of
/// all sessions. Ties keep first-appearance order.
fn transaction_scores(sessions: &[Session]) -> Vec<TransactionScore> {
    let mut order: Vec<&str> = Vec::new();
    let mut weights: HashMap<&str, u64> = HashMap::new();
    let mut total: u64 = 0;

    for session in sessions {
        let probability = u64::from(session.probability());
        total += probability;

        let mut seen: Vec<&str> = Vec::new();
        for action in session.actions() {
            if let Action::Transaction(transaction) = action {
                let name = transaction.name();
                if seen.contains(&name) {
                    continue;
                }
                seen.push(name);
                if !weights.contains_key(name) {
                    order.push(name);
                }
                *weights.entry(name).or_insert(0) += probability;
            }
        }
    }

    let mut scores: Vec<TransactionScore> = order
        .into_iter()
        .map(|name| {
            let weight = weights.get(name).copied().unwrap_or(0);
            let score = if total == 0 {
                0.0
            } else {
                weight as f64 * 100.0 / total as f64
            };
            TransactionScore {
                name: name.to_owned(),
                score,
            }
        })
        .collect();
    scores.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Plan;
    use crate::session::RequestData;
    use crate::Method;

    fn add_requests(session: &mut Session, transaction: &str, count: usize) {
        let tx = session.add_transaction(transaction);
        for i in 0..count {
            tx.add_request(Method::Get, format!("/api/{}", i), RequestData::default());
        }
    }

    #[test]
    fn requests_per_second_works() {
        let mut plan = Plan::default();
        let session = plan.add_session("browse", None).unwrap();
        add_requests(session, "first", 5);
        session.think(12.0, None).unwrap();
        add_requests(session, "second", 3);
        session.think(8.0, None).unwrap();

        let stats = SessionStatistics::from_session(&plan.sessions()[0]);
        assert_eq!(stats.requests, 8);
        assert_eq!(stats.total_think, 20.0);
        assert!((stats.requests_per_second - 0.4).abs() < 1e-9);
    }

    #[test]
    fn websocket_and_if_requests_are_counted_works() {
        let mut plan = Plan::default();
        let session = plan.add_session("push", None).unwrap();
        let tx = session.add_transaction("push");
        tx.add_websocket_message("hello");
        let statement = tx.add_if_statement("has_more", "true");
        statement.add_request(Method::Get, "/a", RequestData::default());
        statement.add_request(Method::Get, "/b", RequestData::default());
        tx.add_if_statement("empty", "true");
        session.think(1.0, None).unwrap();

        assert_eq!(SessionStatistics::from_session(&plan.sessions()[0]).requests, 3);
    }

    #[test]
    fn session_without_think_is_infinite_works() {
        let mut plan = Plan::default();
        add_requests(plan.add_session("burst", None).unwrap(), "burst", 2);
        let stats = SessionStatistics::from_session(&plan.sessions()[0]);
        assert!(stats.requests_per_second.is_infinite());
    }

    #[test]
    fn weighted_averages_works() {
        let mut plan = Plan::default();
        let a = plan.add_session("a", Some(60)).unwrap();
        add_requests(a, "login", 10);
        a.think(20.0, None).unwrap();
        let b = plan.add_session("b", Some(40)).unwrap();
        add_requests(b, "browse", 4);
        b.think(40.0, None).unwrap();

        let stats = PlanStatistics::from_sessions(plan.sessions());
        let expected_rps = 0.6 * 0.5 + 0.4 * 0.1;
        assert!((stats.weighted_average_requests_per_second - expected_rps).abs() < 1e-9);
        assert!((stats.weighted_average_session_length - (0.6 * 20.0 + 0.4 * 40.0)).abs() < 1e-9);
        assert_eq!(stats.max_session_length, 40.0);
    }

    #[test]
    fn transaction_scores_works() {
        let mut plan = Plan::default();
        let a = plan.add_session("a", Some(60)).unwrap();
        add_requests(a, "login", 1);
        add_requests(a, "search", 1);
        add_requests(a, "login", 1);
        let b = plan.add_session("b", Some(40)).unwrap();
        add_requests(b, "search", 1);
        add_requests(b, "browse", 1);

        let scores = PlanStatistics::from_sessions(plan.sessions()).transaction_scores;
        let scores: Vec<(&str, f64)> = scores.iter().map(|s| (s.name.as_str(), s.score)).collect();
        assert_eq!(scores, vec![("search", 100.0), ("login", 60.0), ("browse", 40.0)]);
    }

    #[test]
    fn transaction_scores_without_weight_works() {
        let mut plan = Plan::default();
        add_requests(plan.add_session("idle", Some(0)).unwrap(), "noop", 1);
        let scores = PlanStatistics::from_sessions(plan.sessions()).transaction_scores;
        assert_eq!(scores[0].score, 0.0);
    }
}
