//! Aggregate statistics over the proxy pool.

use crate::proxy::ProxyRecord;

use serde::Serialize;
use std::collections::BTreeMap;

/// Per-proxy breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProxyDetail {
    pub success: u64,
    pub failure: u64,
    pub total: u64,
    /// Percentage, rounded to two decimals.
    pub success_rate: f64,
}

/// Snapshot of pool health.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolStats {
    pub total_proxies: usize,
    /// Proxies below the failure threshold with at least one success.
    pub good_proxies: usize,
    pub bad_proxies: usize,
    pub total_requests: u64,
    pub total_success: u64,
    pub total_failure: u64,
    /// Percentage, rounded to two decimals.
    pub overall_success_rate: f64,
    pub proxy_details: BTreeMap<String, ProxyDetail>,
}

fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 10_000.0).round() / 100.0
}

impl PoolStats {
    pub fn from_records(records: &[ProxyRecord], fail_threshold: u32) -> Self {
        let mut stats = PoolStats {
            total_proxies: records.len(),
            good_proxies: 0,
            bad_proxies: 0,
            total_requests: 0,
            total_success: 0,
            total_failure: 0,
            overall_success_rate: 0.0,
            proxy_details: BTreeMap::new(),
        };

        for record in records {
            stats.total_success += record.success_count;
            stats.total_failure += record.failure_count;
            stats.total_requests += record.total_requests;

            if record.failure_count < u64::from(fail_threshold) && record.success_count > 0 {
                stats.good_proxies += 1;
            }

            stats.proxy_details.insert(
                record.key.clone(),
                ProxyDetail {
                    success: record.success_count,
                    failure: record.failure_count,
                    total: record.total_requests,
                    success_rate: percentage(
                        record.success_count,
                        record.success_count + record.failure_count,
                    ),
                },
            );
        }

        stats.bad_proxies = stats.total_proxies - stats.good_proxies;
        stats.overall_success_rate =
            percentage(stats.total_success, stats.total_success + stats.total_failure);
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_from_records() {
        let records = vec![
            ProxyRecord {
                key: "a:1".to_string(),
                success_count: 3,
                failure_count: 1,
                total_requests: 6,
            },
            ProxyRecord {
                key: "b:1".to_string(),
                success_count: 0,
                failure_count: 2,
                total_requests: 2,
            },
        ];
        let stats = PoolStats::from_records(&records, 3);
        assert_eq!(stats.total_proxies, 2);
        assert_eq!(stats.good_proxies, 1);
        assert_eq!(stats.bad_proxies, 1);
        assert_eq!(stats.overall_success_rate, 50.0);
        assert_eq!(stats.total_requests, 8);
        assert_eq!(stats.proxy_details["a:1"].success_rate, 75.0);
        assert_eq!(stats.proxy_details["b:1"].success_rate, 0.0);
    }

    #[test]
    fn test_stats_empty_pool() {
        let stats = PoolStats::from_records(&[], 3);
        assert_eq!(stats.total_proxies, 0);
        assert_eq!(stats.overall_success_rate, 0.0);
        assert!(stats.proxy_details.is_empty());
    }

    #[test]
    fn test_stats_rounding() {
        let records = vec![ProxyRecord {
            key: "a:1".to_string(),
            success_count: 2,
            failure_count: 1,
            total_requests: 3,
        }];
        let stats = PoolStats::from_records(&records, 3);
        assert_eq!(stats.overall_success_rate, 66.67);
    }
}
