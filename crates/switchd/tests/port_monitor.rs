//! Port monitor reaction to link-change interrupts.

mod common;

use common::{fixture, sign_in};
use switch_hal::sim::CtrlOp;
use switchd::monitor::PortMonitor;
use switch_types::{regs, Role};

#[tokio::test(start_paused = true)]
async fn expansion_link_event_runs_the_flush_sequence() {
    let fx = fixture();
    sign_in(&fx.ctx, Role::ReadOnly).await;

    // Pending interrupt for the expansion port, link up in its status-1.
    fx.controller.set_reg(regs::INTERRUPT_STATUS, 0x10);
    fx.controller.set_reg(0x5E, 1 << regs::LINK_UP_BIT);
    fx.controller.clear_journal();

    PortMonitor::new(fx.ctx.clone()).scan_once().await.unwrap();

    let journal = fx.controller.journal();
    let expected = vec![
        // Scan pass reads the interrupt register and acknowledges the bit.
        CtrlOp::Read { reg: regs::INTERRUPT_STATUS, value: 0x10 },
        CtrlOp::Write { reg: regs::INTERRUPT_STATUS, value: 0x10 },
        // Link state for the notice.
        CtrlOp::Read { reg: 0x5E, value: 1 << regs::LINK_UP_BIT },
        // Learning paused on the expansion port.
        CtrlOp::Read { reg: 0x52, value: 0x00 },
        CtrlOp::Write { reg: 0x52, value: 0x01 },
        // Dynamic MAC flush asserted, polled until clear.
        CtrlOp::Read { reg: regs::GLOBAL_CONTROL_0, value: 0x00 },
        CtrlOp::Write { reg: regs::GLOBAL_CONTROL_0, value: 1 << regs::FLUSH_DYN_MAC_BIT },
        CtrlOp::Read { reg: regs::GLOBAL_CONTROL_0, value: 1 << regs::FLUSH_DYN_MAC_BIT },
        CtrlOp::Read { reg: regs::GLOBAL_CONTROL_0, value: 0x00 },
        // Learning restored.
        CtrlOp::Read { reg: 0x52, value: 0x01 },
        CtrlOp::Write { reg: 0x52, value: 0x00 },
    ];
    assert_eq!(journal, expected);
    assert!(fx.capture.take().contains("Expansion port connected!"));
}

#[tokio::test(start_paused = true)]
async fn ports_are_serviced_expansion_first() {
    let fx = fixture();
    sign_in(&fx.ctx, Role::ReadOnly).await;

    // Interrupts pending on f3 and the expansion port; both links down.
    fx.controller.set_reg(regs::INTERRUPT_STATUS, 0x11);
    fx.controller.clear_journal();

    PortMonitor::new(fx.ctx.clone()).scan_once().await.unwrap();

    let acks: Vec<u8> = fx
        .controller
        .journal()
        .iter()
        .filter_map(|op| match op {
            CtrlOp::Write { reg, value } if *reg == regs::INTERRUPT_STATUS => Some(*value),
            _ => None,
        })
        .collect();
    assert_eq!(acks, vec![0x10, 0x01]);

    let output = fx.capture.take();
    assert!(output.contains("Expansion port disconnected!"));
    assert!(output.contains("Port 3 disconnected!"));
}

#[tokio::test(start_paused = true)]
async fn quiet_interrupt_register_means_no_traffic() {
    let fx = fixture();
    sign_in(&fx.ctx, Role::ReadOnly).await;
    fx.controller.clear_journal();

    PortMonitor::new(fx.ctx.clone()).scan_once().await.unwrap();

    assert_eq!(fx.controller.journal().len(), 1);
    assert_eq!(fx.capture.take(), "");
}
