fn main() {
    #[cfg(feature = "soapy")]
    {
        println!("cargo:rustc-link-lib=SoapySDR");
    }
}
