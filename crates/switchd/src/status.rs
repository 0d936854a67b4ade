//! Read-only rendering of controller state.
//!
//! Each mapping ties a register to its human-readable options; an option is
//! a bitmask plus the names of the values it can take once masked. The
//! tables drive both `port ... status` and the global `system status` view.

use crate::devices::Ctx;
use crate::SwitchdResult;
use switch_types::PortId;

/// A named value an option can hold once the register is masked.
pub struct ValueName {
    pub value: u8,
    pub name: &'static str,
}

/// One maskable setting inside a register.
pub struct OptionMapping {
    pub mask: u8,
    pub description: &'static str,
    pub values: &'static [ValueName],
}

/// One rendered register.
pub struct RegisterMapping {
    /// Register address; port mappings add the port's base offset.
    pub base: u8,
    pub title: &'static str,
    pub options: &'static [OptionMapping],
}

const ON_OFF: &[ValueName] = &[
    ValueName { value: 0x80, name: "True" },
    ValueName { value: 0x00, name: "False" },
];

/// Global switch settings, rendered by `system status`.
pub static GLOBAL_CONFIG_MAPPINGS: &[RegisterMapping] = &[
    RegisterMapping {
        base: 0x01,
        title: "Global Switch Information",
        options: &[
            OptionMapping {
                mask: 0xF0,
                description: "Chip ID",
                values: &[
                    ValueName { value: 0x40, name: "KSZ8895MQX/FQX/ML" },
                    ValueName { value: 0x60, name: "KSZ8895RQX" },
                ],
            },
            OptionMapping {
                mask: 0x01,
                description: "Switch State",
                values: &[
                    ValueName { value: 0x01, name: "Started" },
                    ValueName { value: 0x00, name: "Stopped" },
                ],
            },
        ],
    },
    RegisterMapping {
        base: 0x03,
        title: "Global Control 1",
        options: &[
            OptionMapping { mask: 0x80, description: "Pass All Frames", values: ON_OFF },
            OptionMapping {
                mask: 0x40,
                description: "2K Byte Support",
                values: &[
                    ValueName { value: 0x40, name: "True" },
                    ValueName { value: 0x00, name: "False" },
                ],
            },
            OptionMapping {
                mask: 0x20,
                description: "TX Flow Control Disable",
                values: &[
                    ValueName { value: 0x20, name: "True" },
                    ValueName { value: 0x00, name: "False" },
                ],
            },
            OptionMapping {
                mask: 0x10,
                description: "RX Flow Control Disable",
                values: &[
                    ValueName { value: 0x10, name: "True" },
                    ValueName { value: 0x00, name: "False" },
                ],
            },
            OptionMapping {
                mask: 0x08,
                description: "Frame Length Field Check",
                values: &[
                    ValueName { value: 0x08, name: "True" },
                    ValueName { value: 0x00, name: "False" },
                ],
            },
            OptionMapping {
                mask: 0x02,
                description: "Fast Aging",
                values: &[
                    ValueName { value: 0x02, name: "True" },
                    ValueName { value: 0x00, name: "False" },
                ],
            },
            OptionMapping {
                mask: 0x01,
                description: "Aggressive Back-Off",
                values: &[
                    ValueName { value: 0x01, name: "True" },
                    ValueName { value: 0x00, name: "False" },
                ],
            },
        ],
    },
    RegisterMapping {
        base: 0x05,
        title: "Global Control 3",
        options: &[
            OptionMapping { mask: 0x80, description: "802.1Q VLANs Enabled", values: ON_OFF },
            OptionMapping {
                mask: 0x01,
                description: "Sniff Mode Select",
                values: &[
                    ValueName { value: 0x01, name: "True" },
                    ValueName { value: 0x00, name: "False" },
                ],
            },
        ],
    },
    RegisterMapping {
        base: 0x0B,
        title: "Global Control 9",
        options: &[
            OptionMapping {
                mask: 0x02,
                description: "LED Mode",
                values: &[
                    ValueName { value: 0x02, name: "Mode 1" },
                    ValueName { value: 0x00, name: "Mode 0" },
                ],
            },
            OptionMapping {
                mask: 0x01,
                description: "SPI Read Trigger",
                values: &[
                    ValueName { value: 0x01, name: "Rising Edge" },
                    ValueName { value: 0x00, name: "Falling Edge" },
                ],
            },
        ],
    },
    RegisterMapping {
        base: 0x0C,
        title: "Global Control 10",
        options: &[OptionMapping {
            mask: 0x30,
            description: "CPU Interface Speed",
            values: &[
                ValueName { value: 0x00, name: "41.67 MHz" },
                ValueName { value: 0x10, name: "83.33 MHz" },
                ValueName { value: 0x20, name: "125 MHz" },
            ],
        }],
    },
    RegisterMapping {
        base: 0x0E,
        title: "Power Management",
        options: &[OptionMapping {
            mask: 0x18,
            description: "Power Management Mode",
            values: &[
                ValueName { value: 0x00, name: "Normal Mode" },
                ValueName { value: 0x08, name: "Energy Detection Mode" },
                ValueName { value: 0x10, name: "Soft Power Down Mode" },
                ValueName { value: 0x18, name: "Power Saving Mode" },
            ],
        }],
    },
];

/// Per-port settings, rendered relative to the port's register base.
pub static PORT_CONFIG_MAPPINGS: &[RegisterMapping] = &[
    RegisterMapping {
        base: 0x00,
        title: "Port Control 0",
        options: &[OptionMapping {
            mask: 0x80,
            description: "Broadcast Storm Protection",
            values: ON_OFF,
        }],
    },
    RegisterMapping {
        base: 0x01,
        title: "Port Control 1",
        options: &[
            OptionMapping { mask: 0x80, description: "Sniffer Port", values: ON_OFF },
            OptionMapping {
                mask: 0x40,
                description: "Sniffing RX",
                values: &[
                    ValueName { value: 0x40, name: "True" },
                    ValueName { value: 0x00, name: "False" },
                ],
            },
            OptionMapping {
                mask: 0x20,
                description: "Sniffing TX",
                values: &[
                    ValueName { value: 0x20, name: "True" },
                    ValueName { value: 0x00, name: "False" },
                ],
            },
        ],
    },
    RegisterMapping {
        base: 0x02,
        title: "Port Control 2",
        options: &[
            OptionMapping {
                mask: 0x02,
                description: "Transmit Enabled",
                values: &[
                    ValueName { value: 0x02, name: "True" },
                    ValueName { value: 0x00, name: "False" },
                ],
            },
            OptionMapping {
                mask: 0x01,
                description: "Receive Enabled",
                values: &[
                    ValueName { value: 0x01, name: "True" },
                    ValueName { value: 0x00, name: "False" },
                ],
            },
        ],
    },
    RegisterMapping {
        base: 0x09,
        title: "Port Status 0",
        options: &[
            OptionMapping {
                mask: 0x80,
                description: "MDI/MDI-X Mode",
                values: &[
                    ValueName { value: 0x80, name: "HP Auto MDI/MDI-X" },
                    ValueName { value: 0x00, name: "Micrel Auto MDI/MDI-X" },
                ],
            },
            OptionMapping {
                mask: 0x20,
                description: "Polarity",
                values: &[
                    ValueName { value: 0x20, name: "Reversed" },
                    ValueName { value: 0x00, name: "Not Reversed" },
                ],
            },
            OptionMapping {
                mask: 0x10,
                description: "TX Flow Control",
                values: &[
                    ValueName { value: 0x10, name: "Active" },
                    ValueName { value: 0x00, name: "Disabled" },
                ],
            },
            OptionMapping {
                mask: 0x08,
                description: "RX Flow Control",
                values: &[
                    ValueName { value: 0x08, name: "Active" },
                    ValueName { value: 0x00, name: "Disabled" },
                ],
            },
            OptionMapping {
                mask: 0x04,
                description: "Port Speed",
                values: &[
                    ValueName { value: 0x04, name: "100 Mbps" },
                    ValueName { value: 0x00, name: "10 Mbps" },
                ],
            },
            OptionMapping {
                mask: 0x02,
                description: "Port Duplex Mode",
                values: &[
                    ValueName { value: 0x02, name: "Full" },
                    ValueName { value: 0x00, name: "Half" },
                ],
            },
        ],
    },
    RegisterMapping {
        base: 0x0C,
        title: "Port Control 5",
        options: &[
            OptionMapping {
                mask: 0x80,
                description: "Auto-Negotiation",
                values: &[
                    ValueName { value: 0x80, name: "Disabled" },
                    ValueName { value: 0x00, name: "Enabled" },
                ],
            },
            OptionMapping {
                mask: 0x40,
                description: "Forced Speed (AN must be Disabled)",
                values: &[
                    ValueName { value: 0x40, name: "100 Mbps" },
                    ValueName { value: 0x00, name: "10 Mbps" },
                ],
            },
            OptionMapping {
                mask: 0x20,
                description: "Forced Duplex (AN must be Disabled)",
                values: &[
                    ValueName { value: 0x20, name: "Full" },
                    ValueName { value: 0x00, name: "Half" },
                ],
            },
        ],
    },
    RegisterMapping {
        base: 0x0D,
        title: "Port Control 6",
        options: &[
            OptionMapping { mask: 0x80, description: "LEDs Disabled", values: ON_OFF },
            OptionMapping {
                mask: 0x08,
                description: "Port State",
                values: &[
                    ValueName { value: 0x08, name: "Administratively Disabled" },
                    ValueName { value: 0x00, name: "ON" },
                ],
            },
            OptionMapping {
                mask: 0x04,
                description: "Auto MDI/MDI-X",
                values: &[
                    ValueName { value: 0x04, name: "Disabled" },
                    ValueName { value: 0x00, name: "Enabled" },
                ],
            },
        ],
    },
    RegisterMapping {
        base: 0x0E,
        title: "Port Status 1",
        options: &[
            OptionMapping {
                mask: 0x80,
                description: "MDIX Status",
                values: &[
                    ValueName { value: 0x80, name: "Port using MDI" },
                    ValueName { value: 0x00, name: "Port using MDI-X" },
                ],
            },
            OptionMapping {
                mask: 0x40,
                description: "Auto-Negotiation State",
                values: &[
                    ValueName { value: 0x40, name: "Done" },
                    ValueName { value: 0x00, name: "In-Progress" },
                ],
            },
            OptionMapping {
                mask: 0x20,
                description: "Link Status",
                values: &[
                    ValueName { value: 0x20, name: "Connected" },
                    ValueName { value: 0x00, name: "Disconnected" },
                ],
            },
        ],
    },
];

/// Width of the longest option description in a table, plus separation.
fn alignment(mappings: &[RegisterMapping]) -> usize {
    mappings
        .iter()
        .flat_map(|reg| reg.options)
        .map(|option| option.description.len())
        .max()
        .unwrap_or(0)
        + 2
}

async fn render(ctx: &Ctx, mappings: &[RegisterMapping], base_offset: u8) -> SwitchdResult<()> {
    let width = alignment(mappings);
    for mapping in mappings {
        let data = ctx.controller().read(mapping.base + base_offset).await?;
        for option in mapping.options {
            let masked = data & option.mask;
            ctx.console.write(&format!("\t{}:", option.description));
            if let Some(value) = option.values.iter().find(|v| v.value == masked) {
                let pad = " ".repeat(width - option.description.len());
                ctx.console.write(&format!("{}{}\n", pad, value.name));
            } else {
                ctx.console.write("\n");
            }
        }
    }
    Ok(())
}

/// Renders every global mapping.
pub async fn render_global_status(ctx: &Ctx) -> SwitchdResult<()> {
    render(ctx, GLOBAL_CONFIG_MAPPINGS, 0).await
}

/// Renders every port mapping for one port.
pub async fn render_port_status(ctx: &Ctx, port: PortId) -> SwitchdResult<()> {
    render(ctx, PORT_CONFIG_MAPPINGS, port.hw_base()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_values_belong_to_mask() {
        for table in [GLOBAL_CONFIG_MAPPINGS, PORT_CONFIG_MAPPINGS] {
            for mapping in table {
                for option in mapping.options {
                    for value in option.values {
                        assert_eq!(
                            value.value & !option.mask,
                            0,
                            "{}: value 0x{:02X} escapes mask 0x{:02X}",
                            option.description,
                            value.value,
                            option.mask
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_alignment_covers_longest() {
        let width = alignment(PORT_CONFIG_MAPPINGS);
        for mapping in PORT_CONFIG_MAPPINGS {
            for option in mapping.options {
                assert!(width >= option.description.len() + 2);
            }
        }
    }
}
