//! Last pipeline stage of the `rpc` command: generate the Go file that
//! implements the gRPC server interface by dispatching every RPC back to
//! the original function or method.
//!
//! The generator declares a server type named `{serviceName}Server` with
//! the first letter lowercased, unless the package already declares it,
//! so the implementation can be customized while the methods stay
//! generated. The same goes for the `New{ServiceName}Server` constructor,
//! whose signature is fixed because it registers the implementation.
//! Methods dispatch through a field of the server struct named after the
//! receiver type: the method generated for `func (*Foo) Bar()` calls
//! `s.Foo.Bar(...)`.
//!
//! One file per package is generated, `server.proteus.go`, next to the
//! package sources.

mod context;
mod gen;

pub use context::{constructor_name, service_impl_name};
pub use gen::{Generator, RpcGenError, FACADE_FILE};
