/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::net::IpAddr;
use std::str::FromStr;

use anyhow::anyhow;
use ip_network::IpNetwork;
use yaml_rust::Yaml;

/// A CIDR network, or a single address taken as a host network.
pub fn as_ip_network(v: &Yaml) -> anyhow::Result<IpNetwork> {
    let Yaml::String(s) = v else {
        return Err(anyhow!("yaml value type for ip network should be 'string'"));
    };
    if let Ok(net) = IpNetwork::from_str(s) {
        return Ok(net);
    }
    let ip = IpAddr::from_str(s).map_err(|_| anyhow!("invalid ip network string {s}"))?;
    Ok(IpNetwork::from(ip))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_network() {
        let net = as_ip_network(&Yaml::String("192.168.1.0/24".to_string())).unwrap();
        assert!(net.contains(IpAddr::from_str("192.168.1.17").unwrap()));
        assert!(!net.contains(IpAddr::from_str("192.168.2.1").unwrap()));

        let net = as_ip_network(&Yaml::String("10.1.2.3".to_string())).unwrap();
        assert!(net.contains(IpAddr::from_str("10.1.2.3").unwrap()));

        assert!(as_ip_network(&Yaml::String("10.1.2.3/40".to_string())).is_err());
        assert!(as_ip_network(&Yaml::Integer(1)).is_err());
    }
}
