//! # ftp-session — Stateful FTP Client Session
//!
//! Session-oriented FTP client providing:
//!   • Connection lifecycle (open → login → navigate → close) with state checks
//!   • UTF-8 listing negotiation and passive data connections
//!   • Unix `ls -l` LIST parsing with year inference for recent entries
//!   • Directory entry counting and total file size aggregation
//!   • Errors annotated with the remote working directory at failure time
//!   • A pluggable async transport plus a plain-TCP implementation

pub mod ftp;
