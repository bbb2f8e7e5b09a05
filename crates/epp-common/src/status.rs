//! EPP result codes as described in RFC 5730 §3.

/// Command completed successfully.
pub const SUCCESS: u16 = 1000;
/// Command completed successfully; action pending.
pub const ACTION_PENDING: u16 = 1001;
/// Command completed successfully; no messages.
pub const NO_MESSAGE: u16 = 1300;
/// Command completed successfully; ack to dequeue.
pub const ACK_TO_DEQUEUE: u16 = 1301;
/// Command completed successfully; ending session.
pub const ENDING_SESSION: u16 = 1500;

/// Unknown command.
pub const UNKNOWN_COMMAND: u16 = 2000;
/// Command syntax error.
pub const COMMAND_SYNTAX_ERROR: u16 = 2001;
/// Command use error.
pub const COMMAND_USE_ERROR: u16 = 2002;
/// Required parameter missing.
pub const MISSING_PARAMETER: u16 = 2003;
/// Parameter value range error.
pub const VALUE_RANGE_ERROR: u16 = 2004;
/// Parameter value syntax error.
pub const VALUE_SYNTAX_ERROR: u16 = 2005;

/// Unimplemented protocol version.
pub const UNIMPLEMENTED_PROTOCOL_VERSION: u16 = 2100;
/// Unimplemented command.
pub const UNIMPLEMENTED_COMMAND: u16 = 2101;
/// Unimplemented option.
pub const UNIMPLEMENTED_OPTION: u16 = 2102;
/// Unimplemented extension.
pub const UNIMPLEMENTED_EXTENSION: u16 = 2103;
/// Billing failure.
pub const BILLING_FAILURE: u16 = 2104;
/// Object is not eligible for renewal.
pub const NOT_ELIGIBLE_FOR_RENEWAL: u16 = 2105;
/// Object is not eligible for transfer.
pub const NOT_ELIGIBLE_FOR_TRANSFER: u16 = 2106;

/// Authentication error.
pub const AUTHENTICATION_ERROR: u16 = 2200;
/// Authorization error.
pub const AUTHORIZATION_ERROR: u16 = 2201;
/// Invalid authorization information.
pub const INVALID_AUTHORIZATION_INFORMATION: u16 = 2202;

/// Object pending transfer.
pub const OBJECT_PENDING_TRANSFER: u16 = 2300;
/// Object not pending transfer.
pub const OBJECT_NOT_PENDING_TRANSFER: u16 = 2301;
/// Object exists.
pub const OBJECT_EXISTS: u16 = 2302;
/// Object does not exist.
pub const OBJECT_DOES_NOT_EXIST: u16 = 2303;
/// Object status prohibits operation.
pub const OBJECT_STATUS_PROHIBITS_OPERATION: u16 = 2304;
/// Object association prohibits operation.
pub const OBJECT_ASSOCIATION_PROHIBITS_OPERATION: u16 = 2305;
/// Parameter value policy error.
pub const PARAMETER_POLICY_ERROR: u16 = 2306;
/// Unimplemented object service.
pub const UNIMPLEMENTED_OBJECT_SERVICE: u16 = 2307;
/// Data management policy violation.
pub const DATA_MANAGEMENT_POLICY_VIOLATION: u16 = 2308;

/// Command failed.
pub const COMMAND_FAILED: u16 = 2400;
/// Command failed; server closing connection.
pub const COMMAND_FAILED_CLOSING_CONNECTION: u16 = 2500;
/// Authentication error; server closing connection.
pub const AUTHENTICATION_ERROR_CLOSING_CONNECTION: u16 = 2501;
/// Session limit exceeded; server closing connection.
pub const SESSION_LIMIT_EXCEEDED_CLOSING_CONNECTION: u16 = 2502;

/// Returns the RFC 5730 §3 status text for `code`, or the empty string
/// when the code is not a registered EPP result code.
#[must_use]
pub fn text(code: u16) -> &'static str {
    match code {
        SUCCESS => "Command completed successfully",
        ACTION_PENDING => "Command completed successfully; action pending",
        NO_MESSAGE => "Command completed successfully; no messages",
        ACK_TO_DEQUEUE => "Command completed successfully; ack to dequeue",
        ENDING_SESSION => "Command completed successfully; ending session",

        UNKNOWN_COMMAND => "Unknown command",
        COMMAND_SYNTAX_ERROR => "Command syntax error",
        COMMAND_USE_ERROR => "Command use error",
        MISSING_PARAMETER => "Required parameter missing",
        VALUE_RANGE_ERROR => "Parameter value range error",
        VALUE_SYNTAX_ERROR => "Parameter value syntax error",

        UNIMPLEMENTED_PROTOCOL_VERSION => "Unimplemented protocol version",
        UNIMPLEMENTED_COMMAND => "Unimplemented command",
        UNIMPLEMENTED_OPTION => "Unimplemented option",
        UNIMPLEMENTED_EXTENSION => "Unimplemented extension",
        BILLING_FAILURE => "Billing failure",
        NOT_ELIGIBLE_FOR_RENEWAL => "Object is not eligible for renewal",
        NOT_ELIGIBLE_FOR_TRANSFER => "Object is not eligible for transfer",

        AUTHENTICATION_ERROR => "Authentication error",
        AUTHORIZATION_ERROR => "Authorization error",
        INVALID_AUTHORIZATION_INFORMATION => "Invalid authorization information",

        OBJECT_PENDING_TRANSFER => "Object pending transfer",
        OBJECT_NOT_PENDING_TRANSFER => "Object not pending transfer",
        OBJECT_EXISTS => "Object exists",
        OBJECT_DOES_NOT_EXIST => "Object does not exist",
        OBJECT_STATUS_PROHIBITS_OPERATION => "Object status prohibits operation",
        OBJECT_ASSOCIATION_PROHIBITS_OPERATION => "Object association prohibits operation",
        PARAMETER_POLICY_ERROR => "Parameter value policy error",
        UNIMPLEMENTED_OBJECT_SERVICE => "Unimplemented object service",
        DATA_MANAGEMENT_POLICY_VIOLATION => "Data management policy violation",

        COMMAND_FAILED => "Command failed",
        COMMAND_FAILED_CLOSING_CONNECTION => "Command failed; server closing connection",
        AUTHENTICATION_ERROR_CLOSING_CONNECTION => {
            "Authentication error; server closing connection"
        }
        SESSION_LIMIT_EXCEEDED_CLOSING_CONNECTION => {
            "Session limit exceeded; server closing connection"
        }

        _ => "",
    }
}
