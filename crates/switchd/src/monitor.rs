//! The port link monitor.
//!
//! Polls the controller's interrupt-status register and, for every port with
//! a pending link-change interrupt, clears the bit, reports the new link
//! state, and flushes the dynamic MAC table with learning paused on that
//! port. The flush keeps stale MAC-to-port bindings from black-holing
//! traffic when a cascaded switch moves between ports.

use crate::devices::Ctx;
use crate::{delays, SwitchdResult};
use switch_types::{regs, PortId};
use tracing::{debug, info};

/// The monitor task.
pub struct PortMonitor {
    ctx: Ctx,
}

impl PortMonitor {
    pub fn new(ctx: Ctx) -> Self {
        PortMonitor { ctx }
    }

    /// Runs forever at the long-task cadence; idle until a user session is
    /// active.
    pub async fn run(self) {
        loop {
            if self.ctx.state.read().await.authenticated {
                if let Err(err) = self.scan_once().await {
                    debug!("port scan failed: {err}");
                }
            }
            tokio::time::sleep(delays::LONG).await;
        }
    }

    /// One scan pass over the interrupt-status register. Exposed so tests
    /// can step the task.
    pub async fn scan_once(&self) -> SwitchdResult<()> {
        let flags = self.ctx.controller().read(regs::INTERRUPT_STATUS).await?;
        if flags == 0 {
            return Ok(());
        }

        for port in PortId::SCAN_ORDER {
            if flags & port.interrupt_bit() == 0 {
                continue;
            }
            self.service_port(port).await?;
        }
        Ok(())
    }

    async fn service_port(&self, port: PortId) -> SwitchdResult<()> {
        let controller = self.ctx.controller();

        // Acknowledge this port's interrupt.
        controller
            .write(regs::INTERRUPT_STATUS, port.interrupt_bit())
            .await?;

        let status = controller.read(port.status1_reg()).await?;
        let link_up = (status >> regs::LINK_UP_BIT) & 1 == 1;
        let name = match port {
            PortId::Expansion => "Expansion port".to_string(),
            user => {
                let index = PortId::USER_PORTS
                    .iter()
                    .position(|candidate| *candidate == user)
                    .unwrap_or(0);
                format!("Port {index}")
            }
        };
        if link_up {
            self.ctx.console.write(&format!("\n[SYSTEM]: {name} connected!\n"));
        } else {
            self.ctx
                .console
                .write(&format!("\n[SYSTEM]: {name} disconnected!\n"));
        }
        info!(port = %port, link_up, "link change");

        // Pause learning on the port while the dynamic table flushes.
        let learning_reg = port.reg(regs::PORT_CONTROL2_OFFSET);
        let value = controller.read(learning_reg).await? | (1 << regs::LEARNING_DISABLE_BIT);
        controller.write(learning_reg, value).await?;

        let value =
            controller.read(regs::GLOBAL_CONTROL_0).await? | (1 << regs::FLUSH_DYN_MAC_BIT);
        controller.write(regs::GLOBAL_CONTROL_0, value).await?;
        while (controller.read(regs::GLOBAL_CONTROL_0).await? >> regs::FLUSH_DYN_MAC_BIT) & 1 == 1
        {
            tokio::time::sleep(delays::LONG).await;
        }

        let value = controller.read(learning_reg).await? & !(1 << regs::LEARNING_DISABLE_BIT);
        controller.write(learning_reg, value).await?;
        Ok(())
    }
}
