//! The L1 repeater: every ingress frame is replayed, unchanged, out of
//! every other live port. No learning, no VLAN awareness.

use crate::device::{DeviceId, World};
use crate::proto::EthernetFrame;
use crate::wire::PortId;

impl World {
    pub(crate) fn hub_handle_frame(
        &mut self,
        device: DeviceId,
        ingress: PortId,
        frame: EthernetFrame,
    ) {
        let targets: Vec<PortId> = {
            let Ok(dev) = self.device(device) else {
                return;
            };
            dev.ports
                .values()
                .copied()
                .filter(|pid| *pid != ingress)
                .filter(|pid| {
                    self.ports
                        .get(pid)
                        .map(|p| p.up && p.cable.is_some())
                        .unwrap_or(false)
                })
                .collect()
        };
        for pid in targets {
            self.port_send(pid, frame.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::addr::MacAddr;
    use crate::device::World;
    use crate::proto::{ArpPacket, EthernetFrame, Payload};
    use crate::wire::CableKind;

    #[test]
    fn test_hub_repeats_to_all_other_live_ports() {
        let mut world = World::new();
        let hub = world.add_hub("HUB1", 4);
        let h1 = world.add_host("H1");
        let h2 = world.add_host("H2");
        let h3 = world.add_host("H3");

        world
            .connect_ifaces(CableKind::Cat5e, h1, "eth0", hub, "port1", 5.0)
            .unwrap();
        world
            .connect_ifaces(CableKind::Cat5e, h2, "eth0", hub, "port2", 5.0)
            .unwrap();
        world
            .connect_ifaces(CableKind::Cat5e, h3, "eth0", hub, "port3", 5.0)
            .unwrap();

        let src = world
            .port(world.port_id(h1, "eth0").unwrap())
            .unwrap()
            .mac;
        let frame = EthernetFrame::new(
            src,
            MacAddr::BROADCAST,
            Payload::Arp(ArpPacket::request(
                src,
                "10.0.0.1".parse().unwrap(),
                "10.0.0.2".parse().unwrap(),
            )),
        );
        let h1_eth0 = world.port_id(h1, "eth0").unwrap();
        assert!(world.port_send(h1_eth0, frame));

        // H2 and H3 each saw exactly one frame; the ingress port saw none
        // come back; port4 is uncabled and counted nothing.
        let frames_in = |w: &World, d, iface: &str| {
            w.port(w.port_id(d, iface).unwrap()).unwrap().counters.frames_in
        };
        assert_eq!(frames_in(&world, h2, "eth0"), 1);
        assert_eq!(frames_in(&world, h3, "eth0"), 1);
        assert_eq!(frames_in(&world, h1, "eth0"), 0, "no echo to ingress");
    }
}
