use super::command::{args, CommandRunner};
use super::DriverError;
use crate::config::Hypervisor;

/// Address of the host as seen from a VirtualBox NAT guest.
pub const VIRTUALBOX_NAT_HOST_IP: &str = "10.0.2.2";

/// Resolves the address a guest uses to reach the build host's HTTP server.
pub fn host_ip_for(hypervisor: Hypervisor, interface: &str) -> Result<String, DriverError> {
    match hypervisor {
        Hypervisor::Virtualbox => Ok(VIRTUALBOX_NAT_HOST_IP.to_string()),
        Hypervisor::Vmware => {
            let runner = CommandRunner::new("ifconfig");
            let command_args = args([interface]);
            let output = runner.run(&command_args)?;
            parse_ifconfig_ipv4(&output.stdout).ok_or_else(|| DriverError::UnexpectedOutput {
                command: runner.command_form(&command_args),
                reason: format!("no IPv4 address on interface {interface}"),
            })
        }
    }
}

/// First IPv4 address in `ifconfig` output. Handles both the BSD
/// (`inet 10.0.0.1`) and old Linux (`inet addr:10.0.0.1`) layouts.
pub fn parse_ifconfig_ipv4(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let mut words = line.split_whitespace();
        while let Some(word) = words.next() {
            if word != "inet" {
                continue;
            }
            let candidate = words.next()?;
            let candidate = candidate.strip_prefix("addr:").unwrap_or(candidate);
            if candidate.parse::<std::net::Ipv4Addr>().is_ok() {
                return Some(candidate.to_string());
            }
        }
        None
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virtualbox_uses_nat_gateway() {
        assert_eq!(
            host_ip_for(Hypervisor::Virtualbox, "unused").expect("fixed ip"),
            "10.0.2.2"
        );
    }

    #[test]
    fn parses_bsd_and_linux_layouts() {
        let bsd = "vmnet8: flags=8863<UP,BROADCAST>\n\tinet 172.16.12.1 netmask 0xffffff00 broadcast 172.16.12.255\n";
        assert_eq!(parse_ifconfig_ipv4(bsd).as_deref(), Some("172.16.12.1"));

        let linux = "vmnet8    Link encap:Ethernet\n          inet addr:192.168.56.1  Bcast:192.168.56.255\n";
        assert_eq!(parse_ifconfig_ipv4(linux).as_deref(), Some("192.168.56.1"));
    }

    #[test]
    fn ignores_inet6_only_output() {
        let output = "vmnet8: flags=8863<UP>\n\tinet6 fe80::1%vmnet8 prefixlen 64\n";
        assert_eq!(parse_ifconfig_ipv4(output), None);
    }
}
