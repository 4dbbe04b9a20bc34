pub mod webhook_verifier;
