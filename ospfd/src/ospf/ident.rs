use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

/// What a router says about itself on one segment: its address, Router ID,
/// priority and the DR/BDR it currently declares. Held for the local
/// interface and refreshed from each neighbor's Hello.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Identity {
    pub prefix: Ipv4Net,
    pub router_id: Ipv4Addr,
    pub d_router: Ipv4Addr,
    pub bd_router: Ipv4Addr,
    pub priority: u8,
}

impl Identity {
    pub fn new(router_id: Ipv4Addr) -> Self {
        Self {
            prefix: Ipv4Net::default(),
            router_id,
            d_router: Ipv4Addr::UNSPECIFIED,
            bd_router: Ipv4Addr::UNSPECIFIED,
            priority: 1,
        }
    }

    pub fn addr(&self) -> Ipv4Addr {
        self.prefix.addr()
    }

    // A router declares itself by putting its own interface address in the
    // DR or BDR field.
    pub fn is_declared_dr(&self) -> bool {
        self.d_router == self.addr()
    }

    pub fn is_declared_bdr(&self) -> bool {
        self.bd_router == self.addr()
    }

    /// Priority 0 routers never become DR or BDR.
    pub fn is_eligible(&self) -> bool {
        self.priority > 0
    }

    /// Election rank. Higher priority wins, then higher Router ID.
    pub fn rank(&self) -> (u8, Ipv4Addr) {
        (self.priority, self.router_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_roles_follow_own_address() {
        let mut ident = Identity::new(Ipv4Addr::new(1, 1, 1, 1));
        ident.prefix = "10.0.0.1/24".parse().unwrap();
        assert!(!ident.is_declared_dr());

        ident.d_router = ident.addr();
        assert!(ident.is_declared_dr());
        assert!(!ident.is_declared_bdr());

        ident.priority = 0;
        assert!(!ident.is_eligible());
    }

    #[test]
    fn rank_orders_priority_before_router_id() {
        let mut low = Identity::new(Ipv4Addr::new(9, 9, 9, 9));
        let mut high = Identity::new(Ipv4Addr::new(1, 1, 1, 1));
        low.priority = 1;
        high.priority = 2;
        assert!(high.rank() > low.rank());

        high.priority = 1;
        assert!(low.rank() > high.rank());
    }
}
