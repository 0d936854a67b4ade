//! Interpreter behavior: tokenizing, tree walking, permissions, login.

mod common;

use common::{fixture, sign_in};
use switch_hal::sim::EepromFrame;
use switchd::cli::Interpreter;
use switch_types::{regs, Role};

#[tokio::test(start_paused = true)]
async fn unknown_command_is_reported() {
    let fx = fixture();
    sign_in(&fx.ctx, Role::Administrator).await;
    let interpreter = Interpreter::new(fx.ctx.clone());

    interpreter.execute_line("bogus").await;
    assert!(fx.capture.take().contains("Command Not Recognized."));
}

#[tokio::test(start_paused = true)]
async fn partial_command_is_reported_as_incomplete() {
    let fx = fixture();
    sign_in(&fx.ctx, Role::Administrator).await;
    let interpreter = Interpreter::new(fx.ctx.clone());

    interpreter.execute_line("port f0 vlan").await;
    let output = fx.capture.take();
    assert!(output.contains("Incomplete Command Entered"), "output: {output}");
    assert!(output.contains("port f0 "), "output: {output}");
}

#[tokio::test(start_paused = true)]
async fn trailing_tokens_after_a_terminal_are_rejected() {
    let fx = fixture();
    sign_in(&fx.ctx, Role::Administrator).await;
    let interpreter = Interpreter::new(fx.ctx.clone());

    interpreter.execute_line("logout now please").await;
    assert!(fx
        .capture
        .take()
        .contains("Invalid Command, too many parameters entered!"));
    // The handler never ran.
    assert!(fx.ctx.state.read().await.authenticated);
}

#[tokio::test(start_paused = true)]
async fn overlong_lines_are_rejected() {
    let fx = fixture();
    sign_in(&fx.ctx, Role::Administrator).await;
    let interpreter = Interpreter::new(fx.ctx.clone());

    let line = vec!["word"; 128].join(" ");
    interpreter.execute_line(&line).await;
    assert!(fx.capture.take().contains("Command issued is too long"));
}

#[tokio::test(start_paused = true)]
async fn read_only_user_cannot_save_config() {
    let fx = fixture();
    sign_in(&fx.ctx, Role::ReadOnly).await;
    let interpreter = Interpreter::new(fx.ctx.clone());
    fx.eeprom.clear_frames();

    interpreter.execute_line("config save").await;
    assert!(fx.capture.take().contains("[UNAUTHORIZED]"));

    // No EEPROM mutation of any kind happened.
    let wrote = fx.eeprom.frames().iter().any(|frame| {
        matches!(
            frame,
            EepromFrame::Write { .. } | EepromFrame::PageErase { .. } | EepromFrame::ChipErase
        )
    });
    assert!(!wrote, "unauthorized save touched the EEPROM");
}

#[tokio::test(start_paused = true)]
async fn permission_threshold_is_exact() {
    let fx = fixture();
    let interpreter = Interpreter::new(fx.ctx.clone());

    // ReadOnly may inspect but not modify.
    sign_in(&fx.ctx, Role::ReadOnly).await;
    interpreter.execute_line("port f0 status").await;
    assert!(!fx.capture.take().contains("[UNAUTHORIZED]"));
    interpreter.execute_line("port f0 enable").await;
    assert!(fx.capture.take().contains("[UNAUTHORIZED]"));

    // ModifyPorts reaches port settings but not system settings.
    sign_in(&fx.ctx, Role::ModifyPorts).await;
    interpreter.execute_line("port f0 enable").await;
    assert!(!fx.capture.take().contains("[UNAUTHORIZED]"));
    interpreter.execute_line("config delete").await;
    assert!(fx.capture.take().contains("[UNAUTHORIZED]"));

    // ModifySystem still cannot manage users.
    sign_in(&fx.ctx, Role::ModifySystem).await;
    interpreter.execute_line("config delete").await;
    assert!(!fx.capture.take().contains("[UNAUTHORIZED]"));
    interpreter.execute_line("admin users delete").await;
    assert!(fx.capture.take().contains("[UNAUTHORIZED]"));
}

#[tokio::test(start_paused = true)]
async fn help_marks_elevated_commands() {
    let fx = fixture();
    sign_in(&fx.ctx, Role::ReadOnly).await;
    let interpreter = Interpreter::new(fx.ctx.clone());

    interpreter.execute_line("config ?").await;
    let output = fx.capture.take();
    assert!(output.contains("save*"), "output: {output}");
    assert!(output.contains("[*] Command requires elevated privileges!"));
}

#[tokio::test(start_paused = true)]
async fn port_commands_hit_the_inverted_register_base() {
    let fx = fixture();
    sign_in(&fx.ctx, Role::ModifyPorts).await;
    let interpreter = Interpreter::new(fx.ctx.clone());

    // f0 disable sets bit 3 of port-control-6 in the 0x40 block.
    interpreter.execute_line("port f0 disable").await;
    assert!(fx.capture.take().contains("Command Executed Successfully"));
    assert_eq!(fx.controller.reg(0x4D), 0x08);

    // f3 maps to the 0x10 block.
    interpreter.execute_line("port f3 disable").await;
    assert_eq!(fx.controller.reg(0x1D), 0x08);
}

#[tokio::test(start_paused = true)]
async fn login_prompts_until_credentials_match() {
    let fx = fixture();
    let interpreter = Interpreter::new(fx.ctx.clone());

    for byte in "root\rwrong\r".bytes() {
        fx.input.send(byte).await.unwrap();
    }
    assert!(interpreter.login().await);
    assert!(!fx.ctx.state.read().await.authenticated);
    assert!(fx.capture.take().contains("AUTHENTICATION FAILED!"));

    for byte in "root\rroot\r".bytes() {
        fx.input.send(byte).await.unwrap();
    }
    assert!(interpreter.login().await);
    let state = fx.ctx.state.read().await;
    assert!(state.authenticated);
    assert_eq!(state.active_user.as_ref().unwrap().username, "root");
    let output = fx.capture.take();
    assert!(output.contains("AUTHENTICATION SUCCESSFUL"));
    assert!(output.contains("Welcome DEFAULT ADMIN"));
}

#[tokio::test(start_paused = true)]
async fn self_clearing_bit_completes_via_poll() {
    let fx = fixture();
    sign_in(&fx.ctx, Role::ModifyPorts).await;
    let interpreter = Interpreter::new(fx.ctx.clone());

    // Restart auto-negotiation pulses bit 5 of port control 6; the device
    // model drops the bit after one observed read.
    interpreter.execute_line("port f1 restart-auto-neg").await;
    assert!(fx.capture.take().contains("Command Executed Successfully"));
    assert_eq!(fx.controller.reg(0x30 + regs::PORT_CONTROL6_OFFSET) & (1 << 5), 0);
}
