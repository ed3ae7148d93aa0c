//! Identifiers of the TraCI protocol used by the client.
#![allow(missing_docs)]

// Simulation control
pub const CMD_GETVERSION: u8 = 0x00;
pub const CMD_SIMSTEP: u8 = 0x02;
pub const CMD_CLOSE: u8 = 0x7f;

// Variable access
pub const CMD_GET_TL_VARIABLE: u8 = 0xa2;
pub const CMD_SET_TL_VARIABLE: u8 = 0xc2;
pub const CMD_GET_VEHICLE_VARIABLE: u8 = 0xa4;
pub const CMD_GET_EDGE_VARIABLE: u8 = 0xaa;

/// Offset between a get command and its response.
pub const RESPONSE_OFFSET: u8 = 0x10;

// Variables
pub const TRACI_ID_LIST: u8 = 0x00;
pub const ID_COUNT: u8 = 0x01;
pub const LAST_STEP_VEHICLE_HALTING_NUMBER: u8 = 0x14;
pub const TL_PHASE_INDEX: u8 = 0x22;
pub const TL_CONTROLLED_LANES: u8 = 0x26;
pub const TL_CURRENT_PHASE: u8 = 0x28;
pub const TL_CURRENT_PROGRAM: u8 = 0x29;
pub const TL_COMPLETE_DEFINITION_RYG: u8 = 0x2b;
pub const VAR_WAITING_TIME: u8 = 0x7a;

// Data types
pub const TYPE_UBYTE: u8 = 0x07;
pub const TYPE_BYTE: u8 = 0x08;
pub const TYPE_INTEGER: u8 = 0x09;
pub const TYPE_DOUBLE: u8 = 0x0b;
pub const TYPE_STRING: u8 = 0x0c;
pub const TYPE_STRINGLIST: u8 = 0x0e;
pub const TYPE_COMPOUND: u8 = 0x0f;
pub const TYPE_DOUBLELIST: u8 = 0x10;
pub const TYPE_COLOR: u8 = 0x11;

// Result codes
pub const RTYPE_OK: u8 = 0x00;
pub const RTYPE_NOTIMPLEMENTED: u8 = 0x01;
pub const RTYPE_ERR: u8 = 0xff;
