//! Router: maps a classification label to the next orchestrator state

use super::state::{QueryType, Stage};

/// Total over `QueryType`; only company questions go through retrieval
pub fn route(query_type: QueryType) -> Stage {
    match query_type {
        QueryType::Company => Stage::Retrieving,
        QueryType::General | QueryType::Unknown => Stage::GeneratingDirect,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_table() {
        assert_eq!(route(QueryType::Company), Stage::Retrieving);
        assert_eq!(route(QueryType::General), Stage::GeneratingDirect);
        assert_eq!(route(QueryType::Unknown), Stage::GeneratingDirect);
    }

    #[test]
    fn test_routing_is_deterministic() {
        for _ in 0..100 {
            assert_eq!(route(QueryType::Company), Stage::Retrieving);
        }
    }
}
