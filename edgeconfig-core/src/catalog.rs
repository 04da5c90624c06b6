//! The configuration tables and the consoles that group them

use crate::table::{BitmaskTarget, FieldKind, FieldSpec, KeyCase, TableDescriptor};

pub const SCHEMA_EDGE: &str = "edge";
pub const SCHEMA_ANSS: &str = "anss";
pub const SCHEMA_FETCHER: &str = "fetcher";

/// Every logical schema a table may live in
pub const SCHEMAS: &[&str] = &[SCHEMA_EDGE, SCHEMA_ANSS, SCHEMA_FETCHER];

const TEXT: FieldKind = FieldKind::Text {
    required: false,
    max_len: None,
    multiline: false,
};

const REQUIRED_TEXT: FieldKind = FieldKind::Text {
    required: true,
    max_len: None,
    multiline: false,
};

pub static CPU: TableDescriptor = TableDescriptor {
    name: "cpu",
    schema: SCHEMA_EDGE,
    title: "CPUs",
    key_case: KeyCase::Upper,
    fields: &[
        FieldSpec {
            name: "ipadr",
            label: "IP address",
            kind: FieldKind::Ip { required: true },
        },
        FieldSpec {
            name: "os",
            label: "Operating system",
            kind: TEXT,
        },
        FieldSpec {
            name: "nicks",
            label: "Nicknames",
            kind: TEXT,
        },
        FieldSpec {
            name: "hasdata",
            label: "Has data",
            kind: FieldKind::Bool,
        },
    ],
    bitmask: None,
};

pub static ROLE: TableDescriptor = TableDescriptor {
    name: "role",
    schema: SCHEMA_EDGE,
    title: "Roles",
    key_case: KeyCase::Upper,
    fields: &[
        FieldSpec {
            name: "ipadr",
            label: "IP address",
            kind: FieldKind::Ip { required: true },
        },
        FieldSpec {
            name: "description",
            label: "Description",
            kind: TEXT,
        },
    ],
    bitmask: None,
};

pub static FLAGS: TableDescriptor = TableDescriptor {
    name: "flags",
    schema: SCHEMA_EDGE,
    title: "Channel flags",
    key_case: KeyCase::Upper,
    fields: &[FieldSpec {
        name: "description",
        label: "Description",
        kind: TEXT,
    }],
    bitmask: Some(BitmaskTarget {
        table: "channel",
        column: "flags",
    }),
};

pub static HYDRAFLAGS: TableDescriptor = TableDescriptor {
    name: "hydraflags",
    schema: SCHEMA_EDGE,
    title: "Hydra flags",
    key_case: KeyCase::Upper,
    fields: &[FieldSpec {
        name: "description",
        label: "Description",
        kind: TEXT,
    }],
    bitmask: Some(BitmaskTarget {
        table: "channel",
        column: "hydraflags",
    }),
};

pub static HELP: TableDescriptor = TableDescriptor {
    name: "help",
    schema: SCHEMA_EDGE,
    title: "Help text",
    key_case: KeyCase::Upper,
    fields: &[FieldSpec {
        name: "helptext",
        label: "Help text",
        kind: FieldKind::Text {
            required: false,
            max_len: None,
            multiline: true,
        },
    }],
    bitmask: None,
};

pub static EDGETHREAD: TableDescriptor = TableDescriptor {
    name: "edgethread",
    schema: SCHEMA_EDGE,
    title: "Edgemom thread tags",
    key_case: KeyCase::Upper,
    fields: &[
        FieldSpec {
            name: "classname",
            label: "Class name",
            kind: REQUIRED_TEXT,
        },
        FieldSpec {
            name: "help",
            label: "Help",
            kind: FieldKind::Text {
                required: false,
                max_len: None,
                multiline: true,
            },
        },
        FieldSpec {
            name: "onlyone",
            label: "Only one per edgemom",
            kind: FieldKind::Bool,
        },
    ],
    bitmask: None,
};

pub static OPERATOR: TableDescriptor = TableDescriptor {
    name: "operator",
    schema: SCHEMA_EDGE,
    title: "Operators",
    key_case: KeyCase::Preserve,
    fields: &[
        FieldSpec {
            name: "fullname",
            label: "Full name",
            kind: REQUIRED_TEXT,
        },
        FieldSpec {
            name: "email",
            label: "Email",
            kind: TEXT,
        },
        FieldSpec {
            name: "phone",
            label: "Phone",
            kind: TEXT,
        },
        FieldSpec {
            name: "admin",
            label: "Administrator",
            kind: FieldKind::Bool,
        },
    ],
    bitmask: None,
};

pub const FETCH_TYPES: &[&str] = &["NONE", "CWB", "FDSN", "DATALINK"];

pub static REQUESTTYPE: TableDescriptor = TableDescriptor {
    name: "requesttype",
    schema: SCHEMA_FETCHER,
    title: "Request types",
    key_case: KeyCase::Preserve,
    fields: &[
        FieldSpec {
            name: "requestclass",
            label: "Request class",
            kind: REQUIRED_TEXT,
        },
        FieldSpec {
            name: "cwbip",
            label: "CWB IP",
            kind: FieldKind::Ip { required: false },
        },
        FieldSpec {
            name: "cwbport",
            label: "CWB port",
            kind: FieldKind::Int {
                min: 1,
                max: 32767,
                default: 2061,
            },
        },
        FieldSpec {
            name: "fetchtype",
            label: "Fetch type",
            kind: FieldKind::Enum {
                options: FETCH_TYPES,
            },
        },
        FieldSpec {
            name: "throttle",
            label: "Throttle (b/s)",
            kind: FieldKind::Int {
                min: 0,
                max: 1_000_000_000,
                default: 0,
            },
        },
        FieldSpec {
            name: "disablerequest",
            label: "Disabled",
            kind: FieldKind::Bool,
        },
    ],
    bitmask: None,
};

pub static SNWRULE: TableDescriptor = TableDescriptor {
    name: "snwrule",
    schema: SCHEMA_ANSS,
    title: "SNW rules",
    key_case: KeyCase::Upper,
    fields: &[FieldSpec {
        name: "description",
        label: "Description",
        kind: TEXT,
    }],
    bitmask: None,
};

pub static SNWGROUP: TableDescriptor = TableDescriptor {
    name: "snwgroup",
    schema: SCHEMA_ANSS,
    title: "SNW groups",
    key_case: KeyCase::Upper,
    fields: &[FieldSpec {
        name: "description",
        label: "Description",
        kind: TEXT,
    }],
    bitmask: Some(BitmaskTarget {
        table: "snwstation",
        column: "groupmask",
    }),
};

pub static SNWSTATION: TableDescriptor = TableDescriptor {
    name: "snwstation",
    schema: SCHEMA_ANSS,
    title: "SNW stations",
    key_case: KeyCase::Upper,
    fields: &[
        FieldSpec {
            name: "network",
            label: "Network",
            kind: FieldKind::Text {
                required: true,
                max_len: Some(2),
                multiline: false,
            },
        },
        FieldSpec {
            name: "snwruleid",
            label: "Rule id",
            kind: FieldKind::Int {
                min: 0,
                max: i32::MAX as i64,
                default: 0,
            },
        },
        FieldSpec {
            name: "groupmask",
            label: "Group mask",
            kind: FieldKind::Int {
                min: i64::MIN,
                max: i64::MAX,
                default: 0,
            },
        },
        FieldSpec {
            name: "description",
            label: "Description",
            kind: TEXT,
        },
    ],
    bitmask: None,
};

/// Every table the record editor can open
pub static TABLES: &[&TableDescriptor] = &[
    &CPU,
    &ROLE,
    &FLAGS,
    &HYDRAFLAGS,
    &HELP,
    &EDGETHREAD,
    &OPERATOR,
    &REQUESTTYPE,
    &SNWRULE,
    &SNWGROUP,
    &SNWSTATION,
];

/// Looks a table up by name (case-insensitive)
pub fn table(name: &str) -> Option<&'static TableDescriptor> {
    TABLES
        .iter()
        .copied()
        .find(|t| t.name.eq_ignore_ascii_case(name.trim()))
}

/// A top-level GUI: a named group of tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Console {
    EdgeConfig,
    ChannelDisplay,
    Anss,
    Metadata,
    DbSetup,
    FetchConfig,
}

impl Console {
    pub fn title(&self) -> &'static str {
        match self {
            Console::EdgeConfig => "Edge Configuration",
            Console::ChannelDisplay => "Channel Display Flags",
            Console::Anss => "ANSS Station Configuration",
            Console::Metadata => "Metadata",
            Console::DbSetup => "Database Setup",
            Console::FetchConfig => "NEIC Fetch Configuration",
        }
    }

    pub fn tables(&self) -> &'static [&'static TableDescriptor] {
        match self {
            Console::EdgeConfig => EDGE_CONFIG_TABLES,
            Console::ChannelDisplay => CHANNEL_DISPLAY_TABLES,
            Console::Anss => ANSS_TABLES,
            Console::Metadata => METADATA_TABLES,
            Console::DbSetup => DB_SETUP_TABLES,
            Console::FetchConfig => FETCH_CONFIG_TABLES,
        }
    }
}

static EDGE_CONFIG_TABLES: &[&TableDescriptor] =
    &[&CPU, &ROLE, &EDGETHREAD, &FLAGS, &HYDRAFLAGS, &HELP];
static CHANNEL_DISPLAY_TABLES: &[&TableDescriptor] = &[&FLAGS, &HYDRAFLAGS];
static ANSS_TABLES: &[&TableDescriptor] = &[&SNWSTATION, &SNWRULE, &SNWGROUP];
static METADATA_TABLES: &[&TableDescriptor] = &[&HELP, &EDGETHREAD];
static DB_SETUP_TABLES: &[&TableDescriptor] = &[&OPERATOR, &ROLE, &CPU];
static FETCH_CONFIG_TABLES: &[&TableDescriptor] = &[&REQUESTTYPE];

impl std::fmt::Display for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.title())
    }
}
