mod common;
mod dtls;
mod extensions;
mod resumption;
mod tasks;
mod tls12;
mod tls13;
