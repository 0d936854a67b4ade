//! The CLI interpreter task.
//!
//! While unauthenticated the task owns the login prompt; once a user is
//! signed in it consumes completed console lines, walks the command tree,
//! enforces the terminal node's required role, and reports the handler's
//! outcome.

use crate::cli::tree::{CommandNode, NodeAction, COMMAND_TREE, MAX_DEPTH, MAX_TOKENS, PARAM_CAPACITY};
use crate::devices::Ctx;
use crate::handlers;
use switch_types::{EventCode, Role};
use tracing::{info, warn};

/// The interpreter task over one console session.
pub struct Interpreter {
    ctx: Ctx,
}

impl Interpreter {
    pub fn new(ctx: Ctx) -> Self {
        Interpreter { ctx }
    }

    /// Runs forever: login prompt, then one command per line.
    pub async fn run(self) {
        loop {
            while !self.ctx.state.read().await.authenticated {
                if !self.login().await {
                    return;
                }
            }

            let Some(line) = self.ctx.console.read_line().await else {
                return;
            };
            self.ctx.console.write("\n");
            self.execute_line(&line).await;
            self.prompt().await;
        }
    }

    async fn prompt(&self) {
        let state = self.ctx.state.read().await;
        if state.authenticated {
            self.ctx
                .console
                .write(&format!("\x1b[1m{}\x1b[0m>", state.hostname));
        }
    }

    /// One pass of the login prompt. Returns false when the console closed.
    pub async fn login(&self) -> bool {
        let console = &self.ctx.console;
        console.write("\n\n=== AUTHENTICATION REQUIRED ===\n");

        let username = loop {
            console.write("Username: ");
            match console.read_line().await {
                Some(line) if !line.is_empty() => break line,
                Some(_) => continue,
                None => return false,
            }
        };

        console.set_password_mask(true);
        let password = loop {
            console.write("\nPassword: ");
            match console.read_line().await {
                Some(line) if !line.is_empty() => break line,
                Some(_) => continue,
                None => {
                    console.set_password_mask(false);
                    return false;
                }
            }
        };
        console.set_password_mask(false);

        let matched = {
            let state = self.ctx.state.read().await;
            state.users.authenticate(&username, &password).cloned()
        };
        match matched {
            Some(user) => {
                {
                    let mut state = self.ctx.state.write().await;
                    state.active_user = Some(user.clone());
                    state.authenticated = true;
                }
                self.show_debug_information().await;
                console.write(&format!(
                    "\n\n=== AUTHENTICATION SUCCESSFUL ===\nWelcome {} {}\n",
                    user.first_name, user.last_name
                ));
                console.write("For help with a command, append a '?' and hit <ENTER>\n");
                console.write("ex: port f0 ? \n");
                self.prompt().await;
                self.ctx.events.record(EventCode::UserLoggedIn);
                info!(username = %user.username, "user logged in");
                true
            }
            None => {
                console.write("\nAUTHENTICATION FAILED!\n");
                warn!(%username, "authentication failed");
                true
            }
        }
    }

    /// Post-login banner with the device self-tests.
    async fn show_debug_information(&self) {
        let console = &self.ctx.console;
        if self.ctx.state.read().await.console_mode {
            console.write("\x1b[8;45;100t\n");
            console.write("\x1b[2J\n[Console Mode]: Operating in VT100/ASCII Mode\n");
            console.write("[Auto]: Set Window Size to 100x45\n");
        }
        console.write("\nEagle Embedded Engineering 100BaseTX Switch Configuration Interface\n");

        console.write("[BOOTING]: Testing EEPROM:");
        if self.ctx.eeprom().write(0x0001, 0x19).await.is_ok() {
            console.write(" PASSED!\n");
        } else {
            console.write(" FAILED!\n");
        }

        console.write("[BOOTING]: Testing Ethernet Controller:");
        match self.ctx.controller().read(0x01).await {
            Ok(id) if id > 0 => console.write(" PASSED!\n"),
            _ => console.write(" FAILED!\n"),
        }

        console.write("\n-----------------------------------------\n");
        console.write("|  (c) 2016 Eagle Embedded Engineering  |\n");
        console.write("|       MISL Ethernet Switch Layer      |\n");
        console.write("|            Firmware v1.1.12           |\n");
        console.write("-----------------------------------------\n");
        console.write("-----------------------------------------\n");
        console.write("|      Enter commands one at a time     |\n");
        console.write("| followed by a single carriage return  |\n");
        console.write("-----------------------------------------\n\n");
    }

    /// Tokenizes one line and walks the command tree.
    pub async fn execute_line(&self, line: &str) {
        let tokens: Vec<&str> = line.split(' ').filter(|token| !token.is_empty()).collect();
        if tokens.is_empty() {
            return;
        }
        if tokens.len() > MAX_TOKENS {
            self.ctx.console.write(
                "Command issued is too long. A maximum of 127 words can be issued at any given time.\n",
            );
            return;
        }

        let role = self.ctx.state.read().await.active_role();
        let mut menu = COMMAND_TREE.root();
        let mut params: Vec<String> = Vec::new();
        let mut found_child = false;

        for depth in 0..MAX_DEPTH {
            let Some(token) = tokens.get(depth).copied() else {
                self.report_no_match(found_child, &tokens, depth);
                return;
            };

            if token == "?" {
                self.render_help(menu, role);
                return;
            }

            let matched = COMMAND_TREE
                .menu(menu)
                .iter()
                .find(|node| node.text == token || node.user_param);
            let Some(node) = matched else {
                self.report_no_match(found_child, &tokens, depth);
                return;
            };

            self.collect_params(&mut params, node, token);

            match node.action {
                NodeAction::Run(handler) => {
                    if tokens.len() > depth + 1 {
                        self.ctx
                            .console
                            .write("Invalid Command, too many parameters entered!\n");
                        return;
                    }
                    if node.permission > role {
                        self.ctx.console.write(
                            "[UNAUTHORIZED]: You require elevated permissions to use this command!\n",
                        );
                        return;
                    }
                    match handlers::dispatch(handler, &self.ctx, &params).await {
                        Ok(()) => self
                            .ctx
                            .console
                            .write("\nCommand Executed Successfully\n"),
                        Err(err) => {
                            warn!(command = %line, "command failed: {err}");
                            self.ctx
                                .console
                                .write("\nAn error occurred while executing this task.\n");
                        }
                    }
                    return;
                }
                NodeAction::Menu(child) => {
                    menu = child;
                    found_child = true;
                }
            }
        }
    }

    fn report_no_match(&self, found_child: bool, tokens: &[&str], depth: usize) {
        if !found_child {
            self.ctx.console.write("Command Not Recognized.\n");
        } else {
            self.ctx.console.write("Incomplete Command Entered: \n");
            for token in &tokens[..depth] {
                self.ctx.console.write(&format!("{token} "));
            }
            self.ctx.console.write(
                "<incomplete>\nFor help with commands, type a '?' after the command.\n",
            );
        }
    }

    fn collect_params(&self, params: &mut Vec<String>, node: &CommandNode, token: &str) {
        if node.user_param {
            if params.len() < PARAM_CAPACITY {
                params.push(token.to_string());
            }
        } else {
            for &param in node.params {
                if params.len() < PARAM_CAPACITY {
                    params.push(param.to_string());
                }
            }
        }
    }

    /// Renders one menu's help, starring entries above the caller's role.
    fn render_help(&self, menu: crate::cli::MenuId, role: Role) {
        let nodes = COMMAND_TREE.menu(menu);
        let longest = nodes.iter().map(|node| node.text.len()).max().unwrap_or(0);
        let mut any_elevated = false;

        for node in nodes {
            let elevated = node.permission > role;
            any_elevated |= elevated;
            let marker = if elevated { "*" } else { "" };
            let pad = " ".repeat(longest - node.text.len() + 1);
            self.ctx
                .console
                .write(&format!("\t{}{marker}{pad}\t{}\n", node.text, node.help));
        }
        if any_elevated {
            self.ctx
                .console
                .write("\n[*] Command requires elevated privileges!\n");
        }
    }
}
