//! OPC-UA enumerations used by the catalogue.

use opcwire_spi::wire_enum;

wire_enum! {
    /// Security applied to messages on a secure channel.
    pub enum MessageSecurityMode: u32, 32 {
        Invalid = 0,
        None = 1,
        Sign = 2,
        SignAndEncrypt = 3,
    }
}

wire_enum! {
    /// Which timestamps a read returns.
    pub enum TimestampsToReturn: u32, 32 {
        Source = 0,
        Server = 1,
        Both = 2,
        Neither = 3,
        Invalid = 4,
    }
}

wire_enum! {
    /// Chunk marker of a secure-channel PDU, carried as one ASCII byte.
    pub enum ChunkType: u8, 8 {
        Final = b'F',
        Continue = b'C',
        Abort = b'A',
    }
}

wire_enum! {
    /// Address layout of a node id.
    pub enum NodeIdType: u8, 6 {
        TwoByte = 0,
        FourByte = 1,
        Numeric = 2,
        String = 3,
        Guid = 4,
        ByteString = 5,
    }
}

wire_enum! {
    /// Built-in type carried by a variant.
    pub enum VariantType: u8, 6 {
        Boolean = 1,
        SByte = 2,
        Byte = 3,
        Int16 = 4,
        UInt16 = 5,
        Int32 = 6,
        UInt32 = 7,
        Int64 = 8,
        UInt64 = 9,
        Float = 10,
        Double = 11,
        String = 12,
        DateTime = 13,
        Guid = 14,
        ByteString = 15,
        XmlElement = 16,
        NodeId = 17,
        ExpandedNodeId = 18,
        StatusCode = 19,
        QualifiedName = 20,
        LocalizedText = 21,
        ExtensionObject = 22,
        DataValue = 23,
        Variant = 24,
        DiagnosticInfo = 25,
    }
}

wire_enum! {
    /// Body encoding of an extension object.
    pub enum ExtensionObjectEncoding: u8, 8 {
        NoBody = 0,
        BinaryBody = 1,
        XmlBody = 2,
    }
}
